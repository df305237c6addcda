use async_trait::async_trait;

use super::{Command, CommandContext, CommandResult};

pub struct ChmodCommand;

#[async_trait]
impl Command for ChmodCommand {
    fn name(&self) -> &'static str {
        "chmod"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let args: Vec<&String> = ctx.args.iter().filter(|a| *a != "-R" && *a != "--").collect();
        let recursive = ctx.args.iter().any(|a| a == "-R");
        let (mode_spec, files) = match args.split_first() {
            Some((m, rest)) if !rest.is_empty() => (m.to_string(), rest.to_vec()),
            _ => return CommandResult::error("chmod: missing operand\n".to_string()),
        };
        let mut stderr = String::new();
        let mut exit_code = 0;
        for file in files {
            let path = ctx.resolve(file);
            let mut targets = vec![path.clone()];
            if recursive {
                if let Ok(all) = collect_tree(&ctx, &path).await {
                    targets = all;
                }
            }
            for target in targets {
                let current = match ctx.fs.stat(&target).await {
                    Ok(s) => s.mode,
                    Err(_) => {
                        stderr.push_str(&format!(
                            "chmod: cannot access '{}': No such file or directory\n",
                            file
                        ));
                        exit_code = 1;
                        continue;
                    }
                };
                let new_mode = match apply_mode(&mode_spec, current) {
                    Some(m) => m,
                    None => {
                        return CommandResult::error(format!(
                            "chmod: invalid mode: '{}'\n",
                            mode_spec
                        ))
                    }
                };
                if let Err(e) = ctx.fs.chmod(&target, new_mode).await {
                    stderr.push_str(&format!("chmod: changing permissions of '{}': {}\n", file, e));
                    exit_code = 1;
                }
            }
        }
        CommandResult::with_exit_code(String::new(), stderr, exit_code)
    }
}

async fn collect_tree(ctx: &CommandContext, root: &str) -> Result<Vec<String>, ()> {
    let mut out = vec![root.to_string()];
    let mut queue = vec![root.to_string()];
    while let Some(dir) = queue.pop() {
        if let Ok(entries) = ctx.fs.readdir_entries(&dir).await {
            for entry in entries {
                let child = crate::vfs::path::join(&dir, &entry.name);
                out.push(child.clone());
                if entry.is_directory {
                    queue.push(child);
                }
            }
        }
    }
    Ok(out)
}

/// Octal or the symbolic `[ugoa][+-=][rwx]` subset.
fn apply_mode(spec: &str, current: u32) -> Option<u32> {
    if let Ok(octal) = u32::from_str_radix(spec, 8) {
        return Some(octal & 0o7777);
    }
    let mut mode = current;
    for clause in spec.split(',') {
        let op_pos = clause.find(['+', '-', '='])?;
        let (who_part, rest) = clause.split_at(op_pos);
        let op = rest.chars().next()?;
        let perms = &rest[1..];
        let who_mask: u32 = if who_part.is_empty() {
            0o777
        } else {
            who_part.chars().try_fold(0u32, |acc, c| match c {
                'u' => Some(acc | 0o700),
                'g' => Some(acc | 0o070),
                'o' => Some(acc | 0o007),
                'a' => Some(acc | 0o777),
                _ => None,
            })?
        };
        let bits: u32 = perms.chars().try_fold(0u32, |acc, c| match c {
            'r' => Some(acc | 0o444),
            'w' => Some(acc | 0o222),
            'x' => Some(acc | 0o111),
            'X' => Some(acc | 0o111),
            _ => None,
        })?;
        let selected = bits & who_mask;
        match op {
            '+' => mode |= selected,
            '-' => mode &= !selected,
            '=' => mode = (mode & !who_mask) | selected,
            _ => return None,
        }
    }
    Some(mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::ctx_with_files;

    #[tokio::test]
    async fn test_chmod_octal() {
        let ctx = ctx_with_files(vec!["755", "/f"], vec![("/f", "")]).await;
        let fs = ctx.fs.clone();
        assert_eq!(ChmodCommand.execute(ctx).await.exit_code, 0);
        assert_eq!(fs.stat("/f").await.unwrap().mode, 0o755);
    }

    #[tokio::test]
    async fn test_chmod_symbolic_add() {
        let ctx = ctx_with_files(vec!["u+x", "/f"], vec![("/f", "")]).await;
        let fs = ctx.fs.clone();
        ChmodCommand.execute(ctx).await;
        assert_eq!(fs.stat("/f").await.unwrap().mode, 0o744);
    }

    #[tokio::test]
    async fn test_chmod_missing_file() {
        let ctx = ctx_with_files(vec!["644", "/none"], vec![]).await;
        assert_eq!(ChmodCommand.execute(ctx).await.exit_code, 1);
    }

    #[test]
    fn test_apply_mode() {
        assert_eq!(apply_mode("644", 0), Some(0o644));
        assert_eq!(apply_mode("+x", 0o644), Some(0o755));
        assert_eq!(apply_mode("a-w", 0o666), Some(0o444));
        assert_eq!(apply_mode("u=rwx", 0o000), Some(0o700));
        assert_eq!(apply_mode("go-rx", 0o777), Some(0o722));
        assert_eq!(apply_mode("bogus", 0o644), None);
    }
}
