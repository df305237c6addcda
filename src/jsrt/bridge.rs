//! Host side of the worker bridge.
//!
//! The worker runs on a blocking thread and parks on a condition
//! variable after posting a request; the host services requests against
//! the real filesystem, shell, and network gate, then wakes it. At most
//! one request is outstanding in either direction.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::commands::ExecFn;
use crate::net::FetchFn;
use crate::vfs::Vfs;

use super::protocol::{
    HostCall, STATUS_ERROR, STATUS_EXIT, STATUS_IDLE, STATUS_REQUEST, STATUS_RESPONSE,
};

struct RegionState {
    status: u32,
    payload: Vec<u8>,
}

/// The shared binary region plus its two wakeup signals.
pub struct SharedRegion {
    state: Mutex<RegionState>,
    to_host: Condvar,
    to_worker: Condvar,
}

impl SharedRegion {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegionState { status: STATUS_IDLE, payload: Vec::new() }),
            to_host: Condvar::new(),
            to_worker: Condvar::new(),
        }
    }

    /// Worker side: post a request and block until the host answers.
    pub fn call(&self, call: &HostCall) -> Result<Vec<u8>, String> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while state.status != STATUS_IDLE {
            state = self
                .to_worker
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        state.status = STATUS_REQUEST;
        state.payload = call.encode();
        self.to_host.notify_one();
        while state.status == STATUS_REQUEST {
            state = self
                .to_worker
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        let status = state.status;
        let payload = std::mem::take(&mut state.payload);
        state.status = STATUS_IDLE;
        self.to_worker.notify_one();
        match status {
            STATUS_RESPONSE => Ok(payload),
            STATUS_ERROR => Err(String::from_utf8_lossy(&payload).to_string()),
            _ => Err("bridge closed".to_string()),
        }
    }

    /// Worker side: final exit notification; does not wait for an answer.
    pub fn post_exit(&self, code: i32) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while state.status != STATUS_IDLE {
            state = self
                .to_worker
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        state.status = STATUS_EXIT;
        state.payload = HostCall::Exit { code }.encode();
        self.to_host.notify_one();
    }

    /// Host side: wait briefly for a pending frame. The host polls and
    /// never blocks indefinitely on worker state.
    fn poll_request(&self, timeout: Duration) -> Option<(u32, Vec<u8>)> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (state, _timed_out) = self
            .to_host
            .wait_timeout_while(state, timeout, |s| {
                s.status != STATUS_REQUEST && s.status != STATUS_EXIT
            })
            .unwrap_or_else(|e| e.into_inner());
        if state.status == STATUS_REQUEST || state.status == STATUS_EXIT {
            Some((state.status, state.payload.clone()))
        } else {
            None
        }
    }

    /// Host side: publish the answer to the frame just consumed.
    fn post_answer(&self, status: u32, payload: Vec<u8>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.status = status;
        state.payload = payload;
        self.to_worker.notify_one();
    }
}

impl Default for SharedRegion {
    fn default() -> Self {
        Self::new()
    }
}

/// What the guest's synchronous built-in APIs wrap: each method is one
/// round trip through the region.
#[derive(Clone)]
pub struct WorkerHandle {
    region: Arc<SharedRegion>,
}

impl WorkerHandle {
    pub fn new(region: Arc<SharedRegion>) -> Self {
        Self { region }
    }

    pub fn call(&self, call: HostCall) -> Result<Vec<u8>, String> {
        self.region.call(&call)
    }

    pub fn call_string(&self, call: HostCall) -> Result<String, String> {
        self.call(call)
            .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>, String> {
        self.call(HostCall::ReadFile { path: path.to_string() })
    }

    pub fn write_file(&self, path: &str, data: &[u8]) -> Result<(), String> {
        self.call(HostCall::WriteFile { path: path.to_string(), data: data.to_vec() })
            .map(|_| ())
    }

    pub fn exec(&self, command: &str, stdin: &str) -> Result<(String, String, i32), String> {
        let raw = self.call_string(HostCall::Exec {
            command: command.to_string(),
            stdin: stdin.to_string(),
        })?;
        // stdout, stderr, exit code as a JSON triple.
        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| e.to_string())?;
        Ok((
            value["stdout"].as_str().unwrap_or_default().to_string(),
            value["stderr"].as_str().unwrap_or_default().to_string(),
            value["exitCode"].as_i64().unwrap_or(1) as i32,
        ))
    }

    pub fn fetch(&self, url: &str, method: &str, body: Option<&str>) -> Result<String, String> {
        self.call_string(HostCall::Fetch {
            url: url.to_string(),
            method: method.to_string(),
            body: body.map(str::to_string),
        })
    }

    pub fn exit(&self, code: i32) {
        self.region.post_exit(code);
    }
}

/// Host resources requests are serviced against.
pub struct HostServices {
    pub fs: Arc<dyn Vfs>,
    pub cwd: String,
    pub exec: Option<ExecFn>,
    pub fetch: Option<FetchFn>,
}

impl HostServices {
    fn resolve(&self, path: &str) -> String {
        self.fs.resolve_path(&self.cwd, path)
    }

    async fn service(&self, call: HostCall) -> Result<Vec<u8>, String> {
        match call {
            HostCall::ReadFile { path } => self
                .fs
                .read_file_bytes(&self.resolve(&path))
                .await
                .map_err(|e| e.to_string()),
            HostCall::WriteFile { path, data } => self
                .fs
                .write_file(&self.resolve(&path), &data)
                .await
                .map(|_| Vec::new())
                .map_err(|e| e.to_string()),
            HostCall::AppendFile { path, data } => self
                .fs
                .append_file(&self.resolve(&path), &data)
                .await
                .map(|_| Vec::new())
                .map_err(|e| e.to_string()),
            HostCall::Stat { path } | HostCall::Lstat { path } => {
                let resolved = self.resolve(&path);
                let stat = self
                    .fs
                    .stat(&resolved)
                    .await
                    .map_err(|e| e.to_string())?;
                let value = serde_json::json!({
                    "isFile": stat.is_file,
                    "isDirectory": stat.is_directory,
                    "isSymbolicLink": stat.is_symlink,
                    "mode": stat.mode,
                    "size": stat.size,
                });
                Ok(value.to_string().into_bytes())
            }
            HostCall::Readdir { path } => {
                let names = self
                    .fs
                    .readdir(&self.resolve(&path))
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(serde_json::json!(names).to_string().into_bytes())
            }
            HostCall::Mkdir { path, recursive } => self
                .fs
                .mkdir(&self.resolve(&path), recursive)
                .await
                .map(|_| Vec::new())
                .map_err(|e| e.to_string()),
            HostCall::Rm { path, recursive, force } => self
                .fs
                .rm(&self.resolve(&path), recursive, force)
                .await
                .map(|_| Vec::new())
                .map_err(|e| e.to_string()),
            HostCall::Exists { path } => {
                let exists = self.fs.exists(&self.resolve(&path)).await;
                Ok(vec![exists as u8])
            }
            HostCall::Symlink { target, link } => self
                .fs
                .symlink(&target, &self.resolve(&link))
                .await
                .map(|_| Vec::new())
                .map_err(|e| e.to_string()),
            HostCall::Readlink { path } => self
                .fs
                .readlink(&self.resolve(&path))
                .await
                .map(String::into_bytes)
                .map_err(|e| e.to_string()),
            HostCall::Chmod { path, mode } => self
                .fs
                .chmod(&self.resolve(&path), mode)
                .await
                .map(|_| Vec::new())
                .map_err(|e| e.to_string()),
            HostCall::Realpath { path } => self
                .fs
                .realpath(&self.resolve(&path))
                .await
                .map(String::into_bytes)
                .map_err(|e| e.to_string()),
            HostCall::Rename { from, to } => self
                .fs
                .rename(&self.resolve(&from), &self.resolve(&to))
                .await
                .map(|_| Vec::new())
                .map_err(|e| e.to_string()),
            HostCall::CopyFile { from, to } => self
                .fs
                .copy_file(&self.resolve(&from), &self.resolve(&to))
                .await
                .map(|_| Vec::new())
                .map_err(|e| e.to_string()),
            HostCall::Exec { command, stdin } => {
                let exec = self.exec.as_ref().ok_or("exec unavailable")?;
                let result = exec(command, stdin).await;
                let value = serde_json::json!({
                    "stdout": result.stdout,
                    "stderr": result.stderr,
                    "exitCode": result.exit_code,
                });
                Ok(value.to_string().into_bytes())
            }
            HostCall::Fetch { url, method, body } => {
                let fetch = self.fetch.as_ref().ok_or("network unavailable")?;
                let response = fetch(url, method, HashMap::new(), body).await?;
                let value = serde_json::json!({
                    "status": response.status,
                    "statusText": response.status_text,
                    "body": response.body,
                    "url": response.url,
                });
                Ok(value.to_string().into_bytes())
            }
            HostCall::Exit { .. } => Err("exit is not serviceable".to_string()),
        }
    }
}

/// Drive a guest run to completion: spawn the worker, service its
/// requests, and return its exit code plus any stderr the bridge adds.
pub async fn run_worker(
    guest: Arc<dyn super::GuestRuntime>,
    source: String,
    argv: Vec<String>,
    limits: super::GuestLimits,
    services: HostServices,
) -> i32 {
    let region = Arc::new(SharedRegion::new());
    let handle = WorkerHandle::new(region.clone());
    let worker = tokio::task::spawn_blocking(move || guest.run(&source, &argv, handle, &limits));
    let mut worker = Some(worker);
    let mut exit_code: Option<i32> = None;

    loop {
        let poll_region = region.clone();
        let frame = tokio::task::spawn_blocking(move || {
            poll_region.poll_request(Duration::from_millis(20))
        })
        .await
        .unwrap_or(None);

        if let Some((status, payload)) = frame {
            if status == STATUS_EXIT {
                if let Ok(HostCall::Exit { code }) = HostCall::decode(&payload) {
                    exit_code = Some(code);
                }
                region.post_answer(STATUS_IDLE, Vec::new());
                break;
            }
            match HostCall::decode(&payload) {
                Ok(call) => match services.service(call).await {
                    Ok(response) => region.post_answer(STATUS_RESPONSE, response),
                    Err(message) => {
                        region.post_answer(STATUS_ERROR, message.into_bytes())
                    }
                },
                Err(message) => region.post_answer(STATUS_ERROR, message.into_bytes()),
            }
            continue;
        }

        // No pending frame: has the worker finished on its own?
        if worker.as_ref().map(|t| t.is_finished()).unwrap_or(false) {
            if let Some(task) = worker.take() {
                let code = task.await.unwrap_or(1);
                return exit_code.unwrap_or(code);
            }
        }
    }

    // EXIT was posted; collect the worker's own return as a fallback.
    if let Some(task) = worker.take() {
        let fallback = task.await.unwrap_or(1);
        return exit_code.unwrap_or(fallback);
    }
    exit_code.unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::super::{GuestLimits, GuestRuntime, ScriptedGuest, ScriptedOp};
    use super::*;
    use crate::vfs::MemFs;

    fn services(fs: Arc<dyn Vfs>) -> HostServices {
        HostServices { fs, cwd: "/".to_string(), exec: None, fetch: None }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_reads_and_writes_files() {
        let fs: Arc<dyn Vfs> = Arc::new(MemFs::new());
        fs.write_file("/in.txt", b"from host").await.unwrap();
        let guest = Arc::new(ScriptedGuest::new(vec![
            ScriptedOp::CopyFileThroughBridge {
                from: "/in.txt".to_string(),
                to: "/out.txt".to_string(),
            },
            ScriptedOp::Exit(0),
        ]));
        let code = run_worker(
            guest,
            String::new(),
            Vec::new(),
            GuestLimits::default(),
            services(fs.clone()),
        )
        .await;
        assert_eq!(code, 0);
        assert_eq!(fs.read_file("/out.txt").await.unwrap(), "from host");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_exit_code_propagates() {
        let fs: Arc<dyn Vfs> = Arc::new(MemFs::new());
        let guest = Arc::new(ScriptedGuest::new(vec![ScriptedOp::Exit(42)]));
        let code = run_worker(
            guest,
            String::new(),
            Vec::new(),
            GuestLimits::default(),
            services(fs),
        )
        .await;
        assert_eq!(code, 42);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_error_reply() {
        let fs: Arc<dyn Vfs> = Arc::new(MemFs::new());
        // Reading a missing file produces an ERROR frame; the scripted
        // guest exits 3 when a call fails.
        let guest = Arc::new(ScriptedGuest::new(vec![
            ScriptedOp::CopyFileThroughBridge {
                from: "/missing".to_string(),
                to: "/out".to_string(),
            },
            ScriptedOp::Exit(0),
        ]));
        let code = run_worker(
            guest,
            String::new(),
            Vec::new(),
            GuestLimits::default(),
            services(fs),
        )
        .await;
        assert_eq!(code, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_without_exit_uses_run_return() {
        let fs: Arc<dyn Vfs> = Arc::new(MemFs::new());
        struct Plain;
        impl GuestRuntime for Plain {
            fn run(
                &self,
                _source: &str,
                _argv: &[String],
                _host: WorkerHandle,
                _limits: &GuestLimits,
            ) -> i32 {
                7
            }
        }
        let code = run_worker(
            Arc::new(Plain),
            String::new(),
            Vec::new(),
            GuestLimits::default(),
            services(fs),
        )
        .await;
        assert_eq!(code, 7);
    }
}
