use async_trait::async_trait;

use super::gzip::{gunzip_bytes, gzip_bytes};
use super::{Command, CommandContext, CommandResult};
use crate::vfs::path as vpath;

/// Archive safety caps: a hostile archive aborts instead of filling the
/// sandbox.
const MAX_ENTRIES: usize = 10_000;
const MAX_TOTAL_SIZE: usize = 100 * 1024 * 1024;

const BLOCK: usize = 512;

pub struct TarCommand;

#[derive(Debug, Default)]
struct Options {
    create: bool,
    extract: bool,
    list: bool,
    gzipped: bool,
    verbose: bool,
    archive: Option<String>,
    chdir: Option<String>,
    members: Vec<String>,
}

#[async_trait]
impl Command for TarCommand {
    fn name(&self) -> &'static str {
        "tar"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let options = match parse_args(&ctx.args) {
            Ok(o) => o,
            Err(message) => return CommandResult::error(format!("tar: {}\n", message)),
        };
        let modes = [options.create, options.extract, options.list];
        if modes.iter().filter(|m| **m).count() != 1 {
            return CommandResult::error(
                "tar: must specify exactly one of -c, -t, -x\n".to_string(),
            );
        }
        let base = match &options.chdir {
            Some(dir) => ctx.resolve(dir),
            None => ctx.cwd.clone(),
        };
        if options.create {
            create_archive(&ctx, &options, &base).await
        } else {
            read_archive(&ctx, &options, &base).await
        }
    }
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        let mut consume_file = false;
        let mut consume_dir = false;
        if let Some(flags) = arg.strip_prefix('-').filter(|f| !f.starts_with('-')) {
            for c in flags.chars() {
                match c {
                    'c' => options.create = true,
                    'x' => options.extract = true,
                    't' => options.list = true,
                    'z' => options.gzipped = true,
                    'v' => options.verbose = true,
                    'f' => consume_file = true,
                    'C' => consume_dir = true,
                    _ => return Err(format!("invalid option -- '{}'", c)),
                }
            }
        } else if !arg.starts_with('-') && options.archive.is_none() && i == 0 {
            // Old-style `tar cf archive ...`.
            for c in arg.chars() {
                match c {
                    'c' => options.create = true,
                    'x' => options.extract = true,
                    't' => options.list = true,
                    'z' => options.gzipped = true,
                    'v' => options.verbose = true,
                    'f' => consume_file = true,
                    _ => return Err(format!("invalid option -- '{}'", c)),
                }
            }
        } else {
            match arg.as_str() {
                "--gzip" => options.gzipped = true,
                "-C" => consume_dir = true,
                _ => options.members.push(arg.clone()),
            }
        }
        if consume_file {
            i += 1;
            options.archive = args.get(i).cloned();
            if options.archive.is_none() {
                return Err("option requires an argument -- 'f'".to_string());
            }
        }
        if consume_dir {
            i += 1;
            options.chdir = args.get(i).cloned();
        }
        i += 1;
    }
    Ok(options)
}

async fn create_archive(ctx: &CommandContext, options: &Options, base: &str) -> CommandResult {
    if options.members.is_empty() {
        return CommandResult::error(
            "tar: Cowardly refusing to create an empty archive\n".to_string(),
        );
    }
    let mut verbose_out = String::new();
    let mut bytes: Vec<u8> = Vec::new();
    let mut count = 0usize;
    for member in &options.members {
        let root = ctx.fs.resolve_path(base, member);
        let mut queue = vec![(root.clone(), member.trim_end_matches('/').to_string())];
        while let Some((path, name)) = queue.pop() {
            count += 1;
            if count > MAX_ENTRIES {
                return CommandResult::error("tar: too many archive members\n".to_string());
            }
            let stat = match ctx.fs.lstat(&path).await {
                Ok(s) => s,
                Err(_) => {
                    return CommandResult::with_exit_code(
                        String::new(),
                        format!("tar: {}: Cannot stat: No such file or directory\n", name),
                        2,
                    )
                }
            };
            if stat.is_directory {
                if options.verbose {
                    verbose_out.push_str(&format!("{}/\n", name));
                }
                write_header(&mut bytes, &format!("{}/", name), 0, stat.mode, b'5');
                let mut entries = ctx.fs.readdir(&path).await.unwrap_or_default();
                entries.reverse();
                for entry in entries {
                    queue.push((vpath::join(&path, &entry), format!("{}/{}", name, entry)));
                }
            } else {
                let content = ctx.fs.read_file_bytes(&path).await.unwrap_or_default();
                if bytes.len() + content.len() > MAX_TOTAL_SIZE {
                    return CommandResult::error("tar: archive too large\n".to_string());
                }
                if options.verbose {
                    verbose_out.push_str(&format!("{}\n", name));
                }
                write_header(&mut bytes, &name, content.len(), stat.mode, b'0');
                bytes.extend_from_slice(&content);
                let pad = (BLOCK - content.len() % BLOCK) % BLOCK;
                bytes.extend(std::iter::repeat(0).take(pad));
            }
        }
    }
    // Two zero blocks terminate the archive.
    bytes.extend(std::iter::repeat(0).take(BLOCK * 2));
    if options.gzipped {
        bytes = match gzip_bytes(&bytes) {
            Ok(b) => b,
            Err(message) => return CommandResult::error(format!("tar: {}\n", message)),
        };
    }
    let archive = match &options.archive {
        Some(f) => f.clone(),
        None => return CommandResult::error("tar: refusing to write archive to stdout\n".to_string()),
    };
    match ctx.fs.write_file(&ctx.resolve(&archive), &bytes).await {
        Ok(()) => CommandResult::success(verbose_out),
        Err(e) => CommandResult::error(format!("tar: {}: {}\n", archive, e)),
    }
}

async fn read_archive(ctx: &CommandContext, options: &Options, base: &str) -> CommandResult {
    let archive = match &options.archive {
        Some(f) => f.clone(),
        None => return CommandResult::error("tar: no archive file specified\n".to_string()),
    };
    let mut data = match ctx.fs.read_file_bytes(&ctx.resolve(&archive)).await {
        Ok(d) => d,
        Err(_) => {
            return CommandResult::with_exit_code(
                String::new(),
                format!("tar: {}: Cannot open: No such file or directory\n", archive),
                2,
            )
        }
    };
    if options.gzipped || data.starts_with(&[0x1f, 0x8b]) {
        data = match gunzip_bytes(&data) {
            Ok(d) => d,
            Err(message) => return CommandResult::error(format!("tar: {}\n", message)),
        };
    }
    if data.len() > MAX_TOTAL_SIZE {
        return CommandResult::error("tar: archive too large\n".to_string());
    }
    let mut stdout = String::new();
    let mut offset = 0usize;
    let mut count = 0usize;
    while offset + BLOCK <= data.len() {
        let header = &data[offset..offset + BLOCK];
        if header.iter().all(|b| *b == 0) {
            break;
        }
        count += 1;
        if count > MAX_ENTRIES {
            return CommandResult::error("tar: too many archive members\n".to_string());
        }
        let name = read_string(&header[0..100]);
        let size = read_octal(&header[124..136]);
        let mode = read_octal(&header[100..108]) as u32;
        let kind = header[156];
        offset += BLOCK;
        let content = data
            .get(offset..offset + size)
            .unwrap_or_default()
            .to_vec();
        offset += size.div_ceil(BLOCK) * BLOCK;

        // Reject absolute names and traversal.
        let clean = name.trim_start_matches('/');
        if clean.split('/').any(|part| part == "..") {
            continue;
        }
        let wanted = options.members.is_empty()
            || options
                .members
                .iter()
                .any(|m| clean == *m || clean.starts_with(&format!("{}/", m)));
        if !wanted {
            continue;
        }
        if options.list {
            stdout.push_str(&name);
            stdout.push('\n');
            continue;
        }
        let target = ctx.fs.resolve_path(base, clean);
        if kind == b'5' || name.ends_with('/') {
            if let Err(e) = ctx.fs.mkdir(&target, true).await {
                return CommandResult::error(format!("tar: {}: {}\n", name, e));
            }
        } else {
            let parent = vpath::parent(&target);
            let _ = ctx.fs.mkdir(&parent, true).await;
            if let Err(e) = ctx.fs.write_file(&target, &content).await {
                return CommandResult::error(format!("tar: {}: {}\n", name, e));
            }
            let _ = ctx.fs.chmod(&target, mode & 0o7777).await;
        }
        if options.verbose {
            stdout.push_str(&name);
            stdout.push('\n');
        }
    }
    CommandResult::success(stdout)
}

fn write_header(out: &mut Vec<u8>, name: &str, size: usize, mode: u32, kind: u8) {
    let mut header = [0u8; BLOCK];
    let name_bytes = name.as_bytes();
    let n = name_bytes.len().min(100);
    header[..n].copy_from_slice(&name_bytes[..n]);
    header[100..108].copy_from_slice(format!("{:07o}\0", mode & 0o7777).as_bytes());
    header[108..116].copy_from_slice(b"0000000\0");
    header[116..124].copy_from_slice(b"0000000\0");
    header[124..136].copy_from_slice(format!("{:011o}\0", size).as_bytes());
    header[136..148].copy_from_slice(b"00000000000\0");
    header[156] = kind;
    // ustar magic and version.
    header[257..263].copy_from_slice(b"ustar\0");
    header[263..265].copy_from_slice(b"00");
    // Checksum: spaces while summing, then the octal value.
    header[148..156].copy_from_slice(b"        ");
    let sum: u32 = header.iter().map(|b| *b as u32).sum();
    header[148..155].copy_from_slice(format!("{:06o}\0", sum).as_bytes());
    header[155] = b' ';
    out.extend_from_slice(&header);
}

fn read_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}

fn read_octal(bytes: &[u8]) -> usize {
    let text = read_string(bytes);
    usize::from_str_radix(text.trim().trim_end_matches('\0'), 8).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;
    use crate::commands::CommandContext;

    #[tokio::test]
    async fn test_tar_create_list_extract() {
        let ctx = ctx_with_files(
            vec!["-cf", "/a.tar", "/src"],
            vec![("/src/one.txt", "first"), ("/src/sub/two.txt", "second")],
        )
        .await;
        let fs = ctx.fs.clone();
        assert_eq!(TarCommand.execute(ctx).await.exit_code, 0);
        assert!(fs.exists("/a.tar").await);

        let list_ctx = ctx_with_files(vec!["-tf", "/a.tar"], vec![]).await;
        let list_ctx = CommandContext { fs: fs.clone(), ..list_ctx };
        let listing = TarCommand.execute(list_ctx).await.stdout;
        assert!(listing.contains("/src/one.txt"));
        assert!(listing.contains("/src/sub/two.txt"));

        fs.rm("/src", true, false).await.unwrap();
        let extract_ctx = ctx_with_files(vec!["-xf", "/a.tar"], vec![]).await;
        let extract_ctx = CommandContext { fs: fs.clone(), ..extract_ctx };
        assert_eq!(TarCommand.execute(extract_ctx).await.exit_code, 0);
        assert_eq!(fs.read_file("/src/one.txt").await.unwrap(), "first");
        assert_eq!(fs.read_file("/src/sub/two.txt").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_tar_gzipped_round_trip() {
        let ctx = ctx_with_files(
            vec!["-czf", "/a.tgz", "/data"],
            vec![("/data/f", "zipped")],
        )
        .await;
        let fs = ctx.fs.clone();
        assert_eq!(TarCommand.execute(ctx).await.exit_code, 0);
        fs.rm("/data", true, false).await.unwrap();
        let extract = ctx_with_files(vec!["-xzf", "/a.tgz"], vec![]).await;
        let extract = CommandContext { fs: fs.clone(), ..extract };
        assert_eq!(TarCommand.execute(extract).await.exit_code, 0);
        assert_eq!(fs.read_file("/data/f").await.unwrap(), "zipped");
    }

    #[tokio::test]
    async fn test_tar_missing_archive() {
        let ctx = ctx_with_files(vec!["-xf", "/none.tar"], vec![]).await;
        assert_eq!(TarCommand.execute(ctx).await.exit_code, 2);
    }

    #[tokio::test]
    async fn test_tar_requires_single_mode() {
        let ctx = ctx_with_files(vec!["-cxf", "/a.tar", "/x"], vec![]).await;
        assert_eq!(TarCommand.execute(ctx).await.exit_code, 1);
    }

    #[tokio::test]
    async fn test_tar_verbose_create() {
        let ctx = ctx_with_files(vec!["-cvf", "/a.tar", "/d"], vec![("/d/f", "x")]).await;
        let out = TarCommand.execute(ctx).await.stdout;
        assert!(out.contains("/d/f"));
    }
}
