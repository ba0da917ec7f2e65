//! Minimal HTTP/1.1 server for integration tests that answers each
//! connection with the next scripted reply.
//!
//! Replies are consumed in order; once the script is exhausted every further
//! request gets 500. Request heads are recorded so tests can assert on them.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with a status line, extra headers and a body.
    Respond {
        status: &'static str,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    /// Read the request, then close the connection without answering.
    Hangup,
    /// Write these bytes verbatim, then close.
    Raw(Vec<u8>),
}

impl Reply {
    pub fn ok(body: &[u8]) -> Self {
        Reply::Respond {
            status: "200 OK",
            headers: Vec::new(),
            body: body.to_vec(),
        }
    }

    pub fn status(status: &'static str) -> Self {
        Reply::Respond {
            status,
            headers: Vec::new(),
            body: b"error page".to_vec(),
        }
    }

    pub fn redirect(location: &str) -> Self {
        Reply::Respond {
            status: "302 Found",
            headers: vec![("Location".to_string(), location.to_string())],
            body: b"moved".to_vec(),
        }
    }

    pub fn partial(body: &[u8], start: u64, total: u64) -> Self {
        let end = start + body.len() as u64 - 1;
        Reply::Respond {
            status: "206 Partial Content",
            headers: vec![(
                "Content-Range".to_string(),
                format!("bytes {}-{}/{}", start, end, total),
            )],
            body: body.to_vec(),
        }
    }
}

pub struct ScriptedServer {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedServer {
    /// Request heads received so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start(script: Vec<Reply>) -> ScriptedServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let script = Arc::new(Mutex::new(VecDeque::from(script)));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let head = match read_head(&stream) {
                Some(h) => h,
                None => continue,
            };
            recorded.lock().unwrap().push(head);
            let reply = script.lock().unwrap().pop_front();
            respond(stream, reply);
        }
    });
    ScriptedServer {
        url: format!("http://127.0.0.1:{}/file.bin", port),
        requests,
    }
}

fn read_head(mut stream: &TcpStream) -> Option<String> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8(buf).ok()
}

fn respond(mut stream: TcpStream, reply: Option<Reply>) {
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let (status, headers, body) = match reply {
        Some(Reply::Respond {
            status,
            headers,
            body,
        }) => (status, headers, body),
        Some(Reply::Hangup) => return,
        Some(Reply::Raw(bytes)) => {
            let _ = stream.write_all(&bytes);
            let _ = stream.flush();
            return;
        }
        None => ("500 Internal Server Error", Vec::new(), Vec::new()),
    };
    let mut head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        body.len()
    );
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

/// Value of `name` in a recorded request head.
pub fn request_header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (n, v) = line.split_once(':')?;
        n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}
