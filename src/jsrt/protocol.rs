//! Wire format for the host / worker shared region.
//!
//! The region carries `[status_word | length_word | payload]`. Payload
//! is a tag byte followed by length-prefixed fields (u32 little endian).
//! Only one direction is active at a time; the status word says whose
//! turn it is.

pub const STATUS_IDLE: u32 = 0;
pub const STATUS_REQUEST: u32 = 1;
pub const STATUS_RESPONSE: u32 = 2;
pub const STATUS_ERROR: u32 = 3;
pub const STATUS_EXIT: u32 = 4;

/// A host function the guest may invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    ReadFile { path: String },
    WriteFile { path: String, data: Vec<u8> },
    AppendFile { path: String, data: Vec<u8> },
    Stat { path: String },
    Lstat { path: String },
    Readdir { path: String },
    Mkdir { path: String, recursive: bool },
    Rm { path: String, recursive: bool, force: bool },
    Exists { path: String },
    Symlink { target: String, link: String },
    Readlink { path: String },
    Chmod { path: String, mode: u32 },
    Realpath { path: String },
    Rename { from: String, to: String },
    CopyFile { from: String, to: String },
    Exec { command: String, stdin: String },
    Fetch { url: String, method: String, body: Option<String> },
    Exit { code: i32 },
}

const TAG_READ_FILE: u8 = 1;
const TAG_WRITE_FILE: u8 = 2;
const TAG_APPEND_FILE: u8 = 3;
const TAG_STAT: u8 = 4;
const TAG_LSTAT: u8 = 5;
const TAG_READDIR: u8 = 6;
const TAG_MKDIR: u8 = 7;
const TAG_RM: u8 = 8;
const TAG_EXISTS: u8 = 9;
const TAG_SYMLINK: u8 = 10;
const TAG_READLINK: u8 = 11;
const TAG_CHMOD: u8 = 12;
const TAG_REALPATH: u8 = 13;
const TAG_RENAME: u8 = 14;
const TAG_COPY_FILE: u8 = 15;
const TAG_EXEC: u8 = 16;
const TAG_FETCH: u8 = 17;
const TAG_EXIT: u8 = 18;

fn push_field(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

struct FieldReader<'b> {
    bytes: &'b [u8],
    pos: usize,
}

impl<'b> FieldReader<'b> {
    fn new(bytes: &'b [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn bytes_field(&mut self) -> Result<Vec<u8>, String> {
        if self.pos + 4 > self.bytes.len() {
            return Err("truncated frame".to_string());
        }
        let len = u32::from_le_bytes([
            self.bytes[self.pos],
            self.bytes[self.pos + 1],
            self.bytes[self.pos + 2],
            self.bytes[self.pos + 3],
        ]) as usize;
        self.pos += 4;
        if self.pos + len > self.bytes.len() {
            return Err("truncated frame".to_string());
        }
        let out = self.bytes[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(out)
    }

    fn string_field(&mut self) -> Result<String, String> {
        let bytes = self.bytes_field()?;
        String::from_utf8(bytes).map_err(|_| "invalid utf-8 in frame".to_string())
    }

    fn u32_field(&mut self) -> Result<u32, String> {
        let bytes = self.bytes_field()?;
        if bytes.len() != 4 {
            return Err("bad integer field".to_string());
        }
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn bool_field(&mut self) -> Result<bool, String> {
        Ok(self.u32_field()? != 0)
    }
}

impl HostCall {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::ReadFile { path } => {
                out.push(TAG_READ_FILE);
                push_field(&mut out, path.as_bytes());
            }
            Self::WriteFile { path, data } => {
                out.push(TAG_WRITE_FILE);
                push_field(&mut out, path.as_bytes());
                push_field(&mut out, data);
            }
            Self::AppendFile { path, data } => {
                out.push(TAG_APPEND_FILE);
                push_field(&mut out, path.as_bytes());
                push_field(&mut out, data);
            }
            Self::Stat { path } => {
                out.push(TAG_STAT);
                push_field(&mut out, path.as_bytes());
            }
            Self::Lstat { path } => {
                out.push(TAG_LSTAT);
                push_field(&mut out, path.as_bytes());
            }
            Self::Readdir { path } => {
                out.push(TAG_READDIR);
                push_field(&mut out, path.as_bytes());
            }
            Self::Mkdir { path, recursive } => {
                out.push(TAG_MKDIR);
                push_field(&mut out, path.as_bytes());
                push_field(&mut out, &(*recursive as u32).to_le_bytes());
            }
            Self::Rm { path, recursive, force } => {
                out.push(TAG_RM);
                push_field(&mut out, path.as_bytes());
                push_field(&mut out, &(*recursive as u32).to_le_bytes());
                push_field(&mut out, &(*force as u32).to_le_bytes());
            }
            Self::Exists { path } => {
                out.push(TAG_EXISTS);
                push_field(&mut out, path.as_bytes());
            }
            Self::Symlink { target, link } => {
                out.push(TAG_SYMLINK);
                push_field(&mut out, target.as_bytes());
                push_field(&mut out, link.as_bytes());
            }
            Self::Readlink { path } => {
                out.push(TAG_READLINK);
                push_field(&mut out, path.as_bytes());
            }
            Self::Chmod { path, mode } => {
                out.push(TAG_CHMOD);
                push_field(&mut out, path.as_bytes());
                push_field(&mut out, &mode.to_le_bytes());
            }
            Self::Realpath { path } => {
                out.push(TAG_REALPATH);
                push_field(&mut out, path.as_bytes());
            }
            Self::Rename { from, to } => {
                out.push(TAG_RENAME);
                push_field(&mut out, from.as_bytes());
                push_field(&mut out, to.as_bytes());
            }
            Self::CopyFile { from, to } => {
                out.push(TAG_COPY_FILE);
                push_field(&mut out, from.as_bytes());
                push_field(&mut out, to.as_bytes());
            }
            Self::Exec { command, stdin } => {
                out.push(TAG_EXEC);
                push_field(&mut out, command.as_bytes());
                push_field(&mut out, stdin.as_bytes());
            }
            Self::Fetch { url, method, body } => {
                out.push(TAG_FETCH);
                push_field(&mut out, url.as_bytes());
                push_field(&mut out, method.as_bytes());
                match body {
                    Some(b) => {
                        push_field(&mut out, &1u32.to_le_bytes());
                        push_field(&mut out, b.as_bytes());
                    }
                    None => push_field(&mut out, &0u32.to_le_bytes()),
                }
            }
            Self::Exit { code } => {
                out.push(TAG_EXIT);
                push_field(&mut out, &code.to_le_bytes());
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let tag = *bytes.first().ok_or("empty frame")?;
        let mut reader = FieldReader::new(&bytes[1..]);
        Ok(match tag {
            TAG_READ_FILE => Self::ReadFile { path: reader.string_field()? },
            TAG_WRITE_FILE => Self::WriteFile {
                path: reader.string_field()?,
                data: reader.bytes_field()?,
            },
            TAG_APPEND_FILE => Self::AppendFile {
                path: reader.string_field()?,
                data: reader.bytes_field()?,
            },
            TAG_STAT => Self::Stat { path: reader.string_field()? },
            TAG_LSTAT => Self::Lstat { path: reader.string_field()? },
            TAG_READDIR => Self::Readdir { path: reader.string_field()? },
            TAG_MKDIR => Self::Mkdir {
                path: reader.string_field()?,
                recursive: reader.bool_field()?,
            },
            TAG_RM => Self::Rm {
                path: reader.string_field()?,
                recursive: reader.bool_field()?,
                force: reader.bool_field()?,
            },
            TAG_EXISTS => Self::Exists { path: reader.string_field()? },
            TAG_SYMLINK => Self::Symlink {
                target: reader.string_field()?,
                link: reader.string_field()?,
            },
            TAG_READLINK => Self::Readlink { path: reader.string_field()? },
            TAG_CHMOD => Self::Chmod {
                path: reader.string_field()?,
                mode: reader.u32_field()?,
            },
            TAG_REALPATH => Self::Realpath { path: reader.string_field()? },
            TAG_RENAME => Self::Rename {
                from: reader.string_field()?,
                to: reader.string_field()?,
            },
            TAG_COPY_FILE => Self::CopyFile {
                from: reader.string_field()?,
                to: reader.string_field()?,
            },
            TAG_EXEC => Self::Exec {
                command: reader.string_field()?,
                stdin: reader.string_field()?,
            },
            TAG_FETCH => {
                let url = reader.string_field()?;
                let method = reader.string_field()?;
                let has_body = reader.bool_field()?;
                let body = if has_body {
                    Some(reader.string_field()?)
                } else {
                    None
                };
                Self::Fetch { url, method, body }
            }
            TAG_EXIT => {
                let bytes = reader.bytes_field()?;
                if bytes.len() != 4 {
                    return Err("bad exit frame".to_string());
                }
                Self::Exit {
                    code: i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                }
            }
            other => return Err(format!("unknown frame tag {}", other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_call() {
        let calls = vec![
            HostCall::ReadFile { path: "/a".into() },
            HostCall::WriteFile { path: "/b".into(), data: vec![1, 2, 3] },
            HostCall::AppendFile { path: "/b".into(), data: vec![] },
            HostCall::Stat { path: "/c".into() },
            HostCall::Lstat { path: "/c".into() },
            HostCall::Readdir { path: "/d".into() },
            HostCall::Mkdir { path: "/e".into(), recursive: true },
            HostCall::Rm { path: "/f".into(), recursive: false, force: true },
            HostCall::Exists { path: "/g".into() },
            HostCall::Symlink { target: "/t".into(), link: "/l".into() },
            HostCall::Readlink { path: "/l".into() },
            HostCall::Chmod { path: "/h".into(), mode: 0o755 },
            HostCall::Realpath { path: "/i".into() },
            HostCall::Rename { from: "/j".into(), to: "/k".into() },
            HostCall::CopyFile { from: "/m".into(), to: "/n".into() },
            HostCall::Exec { command: "echo hi".into(), stdin: "in".into() },
            HostCall::Fetch {
                url: "https://x/".into(),
                method: "GET".into(),
                body: None,
            },
            HostCall::Fetch {
                url: "https://x/".into(),
                method: "POST".into(),
                body: Some("payload".into()),
            },
            HostCall::Exit { code: -3 },
        ];
        for call in calls {
            let encoded = call.encode();
            let decoded = HostCall::decode(&encoded).unwrap();
            assert_eq!(decoded, call);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(HostCall::decode(&[]).is_err());
        assert!(HostCall::decode(&[200]).is_err());
        assert!(HostCall::decode(&[TAG_READ_FILE, 10, 0, 0, 0, b'x']).is_err());
    }
}
