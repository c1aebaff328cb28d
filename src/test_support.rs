use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve each canned HTTP response to one connection, in order.
/// Returns the base URL of the listener.
pub async fn serve_http(responses: Vec<(u16, Vec<(String, String)>, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for (status, headers, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            let mut response = format!(
                "HTTP/1.1 {status} Canned\r\nContent-Length: {}\r\nConnection: close\r\n",
                body.len()
            );
            for (name, value) in headers {
                response.push_str(&format!("{name}: {value}\r\n"));
            }
            response.push_str("\r\n");
            response.push_str(&body);

            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{addr}")
}

/// A fake clamd that answers a single command with `reply` (null terminated).
/// The received bytes are sent back through the join handle.
pub async fn serve_clamd(reply: &str) -> (u16, tokio::task::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let reply = format!("{reply}\0");

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
            if command_complete(&received) {
                break;
            }
        }
        let _ = socket.write_all(reply.as_bytes()).await;
        let _ = socket.shutdown().await;
        received
    });

    (port, handle)
}

fn command_complete(received: &[u8]) -> bool {
    const INSTREAM: &[u8] = b"zINSTREAM\0";
    if let Some(mut rest) = received.strip_prefix(INSTREAM) {
        // Walk the length-prefixed chunks until the zero terminator
        loop {
            if rest.len() < 4 {
                return false;
            }
            let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
            if len == 0 {
                return true;
            }
            if rest.len() < 4 + len {
                return false;
            }
            rest = &rest[4 + len..];
        }
    }
    received.ends_with(b"\0")
}
