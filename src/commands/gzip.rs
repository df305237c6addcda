use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use super::{Command, CommandContext, CommandResult};

pub struct GzipCommand;

#[async_trait]
impl Command for GzipCommand {
    fn name(&self) -> &'static str {
        "gzip"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let decompress = ctx.args.iter().any(|a| a == "-d" || a == "--decompress");
        let keep = ctx.args.iter().any(|a| a == "-k" || a == "--keep");
        let to_stdout = ctx.args.iter().any(|a| a == "-c" || a == "--stdout");
        let files: Vec<&String> = ctx.args.iter().filter(|a| !a.starts_with('-')).collect();

        if files.is_empty() {
            // Filter mode is only meaningful with -c; stdin is text here.
            let data = ctx.stdin.clone().into_bytes();
            let result = if decompress {
                gunzip_bytes(&data)
            } else {
                gzip_bytes(&data)
            };
            return match result {
                Ok(bytes) => {
                    CommandResult::success(String::from_utf8_lossy(&bytes).to_string())
                }
                Err(message) => CommandResult::error(format!("gzip: {}\n", message)),
            };
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        for file in files {
            let path = ctx.resolve(file);
            let data = match ctx.fs.read_file_bytes(&path).await {
                Ok(d) => d,
                Err(_) => {
                    stderr.push_str(&format!("gzip: {}: No such file or directory\n", file));
                    exit_code = 1;
                    continue;
                }
            };
            if decompress {
                if !file.ends_with(".gz") && !to_stdout {
                    stderr.push_str(&format!("gzip: {}: unknown suffix -- ignored\n", file));
                    exit_code = 1;
                    continue;
                }
                match gunzip_bytes(&data) {
                    Ok(bytes) => {
                        if to_stdout {
                            stdout.push_str(&String::from_utf8_lossy(&bytes));
                        } else {
                            let target = path.trim_end_matches(".gz").to_string();
                            if let Err(e) = ctx.fs.write_file(&target, &bytes).await {
                                stderr.push_str(&format!("gzip: {}: {}\n", file, e));
                                exit_code = 1;
                                continue;
                            }
                            if !keep {
                                let _ = ctx.fs.rm(&path, false, true).await;
                            }
                        }
                    }
                    Err(message) => {
                        stderr.push_str(&format!("gzip: {}: {}\n", file, message));
                        exit_code = 1;
                    }
                }
            } else {
                match gzip_bytes(&data) {
                    Ok(bytes) => {
                        if to_stdout {
                            stdout.push_str(&String::from_utf8_lossy(&bytes));
                        } else {
                            let target = format!("{}.gz", path);
                            if let Err(e) = ctx.fs.write_file(&target, &bytes).await {
                                stderr.push_str(&format!("gzip: {}: {}\n", file, e));
                                exit_code = 1;
                                continue;
                            }
                            if !keep {
                                let _ = ctx.fs.rm(&path, false, true).await;
                            }
                        }
                    }
                    Err(message) => {
                        stderr.push_str(&format!("gzip: {}: {}\n", file, message));
                        exit_code = 1;
                    }
                }
            }
        }
        CommandResult::with_exit_code(stdout, stderr, exit_code)
    }
}

/// `gunzip` is `gzip -d`.
pub struct GunzipCommand;

#[async_trait]
impl Command for GunzipCommand {
    fn name(&self) -> &'static str {
        "gunzip"
    }

    async fn execute(&self, mut ctx: CommandContext) -> CommandResult {
        ctx.args.insert(0, "-d".to_string());
        GzipCommand.execute(ctx).await
    }
}

/// `zcat` is `gzip -dc`.
pub struct ZcatCommand;

#[async_trait]
impl Command for ZcatCommand {
    fn name(&self) -> &'static str {
        "zcat"
    }

    async fn execute(&self, mut ctx: CommandContext) -> CommandResult {
        ctx.args.insert(0, "-d".to_string());
        ctx.args.insert(1, "-c".to_string());
        GzipCommand.execute(ctx).await
    }
}

pub fn gzip_bytes(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|e| e.to_string())?;
    encoder.finish().map_err(|e| e.to_string())
}

pub fn gunzip_bytes(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|_| "not in gzip format".to_string())?;
    Ok(out)
}
