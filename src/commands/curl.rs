use async_trait::async_trait;
use std::collections::HashMap;

use super::{Command, CommandContext, CommandResult};

/// HTTP client over the gated transport. Exit codes follow curl's
/// conventions: 7 when access is denied or the connection fails, 28 on
/// timeout, 47 when redirects are blocked or exhausted.
pub struct CurlCommand;

#[derive(Default)]
struct Options {
    method: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<String>,
    output: Option<String>,
    include_headers: bool,
    head_only: bool,
    silent: bool,
    fail_on_error: bool,
    url: Option<String>,
}

#[async_trait]
impl Command for CurlCommand {
    fn name(&self) -> &'static str {
        "curl"
    }

    async fn execute(&self, ctx: CommandContext) -> CommandResult {
        let options = match parse_args(&ctx) {
            Ok(o) => o,
            Err(message) => {
                return CommandResult::with_exit_code(
                    String::new(),
                    format!("curl: {}\n", message),
                    2,
                )
            }
        };
        let url = match &options.url {
            Some(u) => u.clone(),
            None => {
                return CommandResult::with_exit_code(
                    String::new(),
                    "curl: no URL specified!\n".to_string(),
                    2,
                )
            }
        };
        let fetch = match &ctx.fetch {
            Some(f) => f.clone(),
            None => {
                return CommandResult::with_exit_code(
                    String::new(),
                    format!("curl: (7) Network access denied: URL not in allow-list: {}\n", url),
                    7,
                )
            }
        };
        let method = options
            .method
            .clone()
            .unwrap_or_else(|| {
                if options.head_only {
                    "HEAD".to_string()
                } else if options.body.is_some() {
                    "POST".to_string()
                } else {
                    "GET".to_string()
                }
            })
            .to_uppercase();
        let mut headers: HashMap<String, String> = HashMap::new();
        for (name, value) in &options.headers {
            headers.insert(name.clone(), value.clone());
        }
        let response = match fetch(url.clone(), method, headers, options.body.clone()).await {
            Ok(r) => r,
            Err(message) => {
                let exit_code = exit_code_for(&message);
                return CommandResult::with_exit_code(
                    String::new(),
                    format!("curl: ({}) {}\n", exit_code, message),
                    exit_code,
                );
            }
        };

        let mut output = String::new();
        if options.include_headers || options.head_only {
            output.push_str(&format!(
                "HTTP/1.1 {} {}\r\n",
                response.status, response.status_text
            ));
            let mut names: Vec<&String> = response.headers.keys().collect();
            names.sort();
            for name in names {
                output.push_str(&format!(
                    "{}: {}\r\n",
                    name,
                    response.headers.get(name).cloned().unwrap_or_default()
                ));
            }
            output.push_str("\r\n");
        }
        if !options.head_only {
            output.push_str(&response.body);
        }

        if options.fail_on_error && response.status >= 400 {
            return CommandResult::with_exit_code(
                String::new(),
                if options.silent {
                    String::new()
                } else {
                    format!(
                        "curl: (22) The requested URL returned error: {}\n",
                        response.status
                    )
                },
                22,
            );
        }

        if let Some(path) = &options.output {
            let resolved = ctx.resolve(path);
            if let Err(e) = ctx.fs.write_file(&resolved, output.as_bytes()).await {
                return CommandResult::with_exit_code(
                    String::new(),
                    format!("curl: (23) Failed writing body: {}\n", e),
                    23,
                );
            }
            return CommandResult::success(String::new());
        }
        CommandResult::success(output)
    }
}

fn parse_args(ctx: &CommandContext) -> Result<Options, String> {
    let mut options = Options::default();
    let mut i = 0;
    while i < ctx.args.len() {
        let arg = &ctx.args[i];
        match arg.as_str() {
            "-X" | "--request" => {
                i += 1;
                options.method = ctx.args.get(i).cloned();
            }
            "-H" | "--header" => {
                i += 1;
                if let Some(header) = ctx.args.get(i) {
                    if let Some((name, value)) = header.split_once(':') {
                        options
                            .headers
                            .push((name.trim().to_lowercase(), value.trim().to_string()));
                    }
                }
            }
            "-d" | "--data" | "--data-raw" | "--data-binary" => {
                i += 1;
                options.body = ctx.args.get(i).cloned();
            }
            "-o" | "--output" => {
                i += 1;
                options.output = ctx.args.get(i).cloned();
            }
            "-i" | "--include" => options.include_headers = true,
            "-I" | "--head" => options.head_only = true,
            "-s" | "--silent" | "-S" => options.silent = true,
            "-f" | "--fail" => options.fail_on_error = true,
            "-L" | "--location" | "-k" | "--insecure" | "--compressed" => {}
            _ if arg.starts_with('-') => {
                return Err(format!("option {}: is unknown", arg));
            }
            _ => options.url = Some(arg.clone()),
        }
        i += 1;
    }
    Ok(options)
}

fn exit_code_for(message: &str) -> i32 {
    if message.contains("Redirect target not in allow-list")
        || message.contains("Too many redirects")
    {
        47
    } else if message.contains("timed out") {
        28
    } else if message.contains("method") && message.contains("not allowed") {
        7
    } else {
        7
    }
}
