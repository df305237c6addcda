use async_trait::async_trait;
use chrono::{DateTime, Local};

use super::{Command, CommandContext, CommandResult};
use crate::vfs::{DirEntry, FsStat};

pub struct LsCommand;

#[async_trait]
impl Command for LsCommand {
    fn name(&self) -> &'static str {
        "ls"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let mut all = false;
        let mut long = false;
        let mut one_per_line = false;
        let mut classify = false;
        let mut reverse = false;
        let mut dirs_themselves = false;
        let mut paths: Vec<String> = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "--" => {}
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    for c in arg.chars().skip(1) {
                        match c {
                            'a' | 'A' => all = true,
                            'l' => long = true,
                            '1' => one_per_line = true,
                            'F' => classify = true,
                            'r' => reverse = true,
                            'd' => dirs_themselves = true,
                            'h' | 't' | 'R' => {}
                            _ => {
                                return CommandResult::with_exit_code(
                                    String::new(),
                                    format!("ls: invalid option -- '{}'\n", c),
                                    2,
                                )
                            }
                        }
                    }
                }
                _ => paths.push(arg.clone()),
            }
        }
        if paths.is_empty() {
            paths.push(".".to_string());
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        let many = paths.len() > 1;
        for (index, raw) in paths.iter().enumerate() {
            let path = ctx.resolve(raw);
            let stat = match ctx.fs.stat(&path).await {
                Ok(s) => s,
                Err(_) => {
                    stderr.push_str(&format!(
                        "ls: cannot access '{}': No such file or directory\n",
                        raw
                    ));
                    exit_code = 2;
                    continue;
                }
            };
            if !stat.is_directory || dirs_themselves {
                let entry = DirEntry {
                    name: raw.clone(),
                    is_file: stat.is_file,
                    is_directory: stat.is_directory,
                    is_symlink: stat.is_symlink,
                };
                if long {
                    stdout.push_str(&long_line(&entry, &stat));
                } else {
                    stdout.push_str(raw);
                    stdout.push('\n');
                }
                continue;
            }
            let mut entries = match ctx.fs.readdir_entries(&path).await {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !all {
                entries.retain(|e| !e.name.starts_with('.'));
            }
            if reverse {
                entries.reverse();
            }
            if many {
                if index > 0 {
                    stdout.push('\n');
                }
                stdout.push_str(&format!("{}:\n", raw));
            }
            if long {
                stdout.push_str(&format!("total {}\n", entries.len()));
                for entry in &entries {
                    let child = crate::vfs::path::join(&path, &entry.name);
                    if let Ok(stat) = ctx.fs.lstat(&child).await {
                        stdout.push_str(&long_line(entry, &stat));
                    }
                }
            } else {
                for entry in &entries {
                    stdout.push_str(&entry.name);
                    if classify {
                        if entry.is_directory {
                            stdout.push('/');
                        } else if entry.is_symlink {
                            stdout.push('@');
                        }
                    }
                    stdout.push('\n');
                }
            }
            let _ = one_per_line;
        }
        CommandResult::with_exit_code(stdout, stderr, exit_code)
    }
}

fn long_line(entry: &DirEntry, stat: &FsStat) -> String {
    let kind = if stat.is_symlink {
        'l'
    } else if stat.is_directory {
        'd'
    } else {
        '-'
    };
    let perms = render_mode(stat.mode);
    let when: DateTime<Local> = stat.mtime.into();
    format!(
        "{}{} 1 user user {:>8} {} {}\n",
        kind,
        perms,
        stat.size,
        when.format("%b %e %H:%M"),
        entry.name
    )
}

fn render_mode(mode: u32) -> String {
    let mut s = String::with_capacity(9);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        s.push(if bits & 4 != 0 { 'r' } else { '-' });
        s.push(if bits & 2 != 0 { 'w' } else { '-' });
        s.push(if bits & 1 != 0 { 'x' } else { '-' });
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_ls_lists_sorted() {
        let ctx = ctx_with_files(
            vec!["/d"],
            vec![("/d/b.txt", ""), ("/d/a.txt", ""), ("/d/.hidden", "")],
        )
        .await;
        assert_eq!(LsCommand.execute(ctx).await.stdout, "a.txt\nb.txt\n");
    }

    #[tokio::test]
    async fn test_ls_all_shows_hidden() {
        let ctx = ctx_with_files(vec!["-a", "/d"], vec![("/d/.hidden", ""), ("/d/x", "")]).await;
        assert_eq!(LsCommand.execute(ctx).await.stdout, ".hidden\nx\n");
    }

    #[tokio::test]
    async fn test_ls_missing_path() {
        let ctx = ctx_with_files(vec!["/none"], vec![]).await;
        let result = LsCommand.execute(ctx).await;
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("cannot access"));
    }

    #[tokio::test]
    async fn test_ls_file_argument() {
        let ctx = ctx_with_files(vec!["/f.txt"], vec![("/f.txt", "x")]).await;
        assert_eq!(LsCommand.execute(ctx).await.stdout, "/f.txt\n");
    }

    #[tokio::test]
    async fn test_ls_long_format() {
        let ctx = ctx_with_files(vec!["-l", "/d"], vec![("/d/a", "abc")]).await;
        let out = LsCommand.execute(ctx).await.stdout;
        assert!(out.starts_with("total 1\n"));
        assert!(out.contains("-rw-r--r--"));
        assert!(out.contains(" a\n"));
    }

    #[tokio::test]
    async fn test_ls_classify() {
        let ctx = ctx_with_files(vec!["-F", "/d"], vec![("/d/sub/x", ""), ("/d/f", "")]).await;
        let out = LsCommand.execute(ctx).await.stdout;
        assert!(out.contains("sub/"));
        assert!(out.contains("f\n"));
    }

    #[test]
    fn test_render_mode() {
        assert_eq!(render_mode(0o755), "rwxr-xr-x");
        assert_eq!(render_mode(0o644), "rw-r--r--");
        assert_eq!(render_mode(0o000), "---------");
    }
}
