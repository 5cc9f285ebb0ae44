use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{NntpError, Result};

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// An article ready to POST. `body` is already yEnc-encoded
/// ciphertext with `=ybegin`/`=yend` markers applied by the caller.
#[derive(Debug, Clone)]
pub struct Article {
    pub from: String,
    pub newsgroups: String,
    pub subject: String,
    pub message_id: String,
    pub body: Vec<u8>,
}

/// A single NNTP connection over any `AsyncRead + AsyncWrite` transport
/// (TLS in production, an in-memory duplex stream in tests). Owns no pool
/// state; [`crate::pool::ConnectionPool`] is the only thing that knows
/// about idle timers and scoped acquisition.
pub struct NntpConnection<S> {
    reader: BufReader<tokio::io::ReadHalf<S>>,
    writer: tokio::io::WriteHalf<S>,
}

//--------------------------------------------------------------------------------------------------
// Implementation
//--------------------------------------------------------------------------------------------------

impl<S: AsyncRead + AsyncWrite + Unpin> NntpConnection<S> {
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self { reader: BufReader::new(read_half), writer: write_half }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(NntpError::Transient("connection closed by peer".into()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Reads a dot-stuffed multi-line block (article body) until the
    /// terminating `.` line, unstuffing any leading `..`.
    async fn read_multiline(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line == "." {
                break;
            }
            let unstuffed = line.strip_prefix('.').unwrap_or(&line);
            out.extend_from_slice(unstuffed.as_bytes());
            out.push(b'\n');
        }
        Ok(out)
    }

    fn status_code(line: &str) -> Result<u32> {
        line.split_whitespace()
            .next()
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| NntpError::Transient(format!("malformed response: {line}")))
    }

    /// Opens the session: reads the greeting, sends `AUTHINFO USER`/`PASS`,
    /// and fails with [`NntpError::Auth`] on anything other than `281`.
    pub async fn handshake(&mut self, host: &str, username: &str, password: &str) -> Result<()> {
        let greeting = self.read_line().await?;
        let code = Self::status_code(&greeting)?;
        if code != 200 && code != 201 {
            return Err(NntpError::Auth { host: host.to_string() });
        }

        if username.is_empty() {
            return Ok(());
        }

        self.write_line(&format!("AUTHINFO USER {username}")).await?;
        let response = self.read_line().await?;
        if Self::status_code(&response)? != 381 {
            return Err(NntpError::Auth { host: host.to_string() });
        }

        self.write_line(&format!("AUTHINFO PASS {password}")).await?;
        let response = self.read_line().await?;
        if Self::status_code(&response)? != 281 {
            return Err(NntpError::Auth { host: host.to_string() });
        }
        Ok(())
    }

    /// POSTs `article`, returning the server-confirmed status. A `340`
    /// invite is expected before the body; `240` confirms success, `4xx`
    /// is transient, anything else is a [`NntpError::PermanentPostFailure`].
    pub async fn post(&mut self, article: &Article) -> Result<()> {
        self.write_line("POST").await?;
        let invite = self.read_line().await?;
        let code = Self::status_code(&invite)?;
        if code != 340 {
            return Err(classify_post_failure(&article.subject, code, &invite));
        }

        self.write_line(&format!("From: {}", article.from)).await?;
        self.write_line(&format!("Newsgroups: {}", article.newsgroups)).await?;
        self.write_line(&format!("Subject: {}", article.subject)).await?;
        self.write_line(&format!("Message-ID: {}", article.message_id)).await?;
        self.write_line("").await?;

        for line in article.body.split(|&b| b == b'\n') {
            let text = String::from_utf8_lossy(line);
            let stuffed = if text.starts_with('.') { format!(".{text}") } else { text.into_owned() };
            self.write_line(&stuffed).await?;
        }
        self.write_line(".").await?;

        let response = self.read_line().await?;
        let code = Self::status_code(&response)?;
        if code == 240 {
            Ok(())
        } else {
            Err(classify_post_failure(&article.subject, code, &response))
        }
    }

    /// Retrieves an article body by `message_id`. A `430` response maps to
    /// [`NntpError::NoSuchArticle`] so callers can fall back to subject
    /// search.
    pub async fn article(&mut self, message_id: &str) -> Result<Vec<u8>> {
        self.write_line(&format!("ARTICLE {message_id}")).await?;
        let response = self.read_line().await?;
        let code = Self::status_code(&response)?;
        match code {
            220 => self.read_multiline().await,
            430 => Err(NntpError::NoSuchArticle),
            400..=499 => Err(NntpError::Transient(response)),
            other => Err(NntpError::Transient(format!("unexpected ARTICLE response {other}"))),
        }
    }

    /// Cheap existence check before a full retrieval.
    pub async fn stat(&mut self, message_id: &str) -> Result<bool> {
        self.write_line(&format!("STAT {message_id}")).await?;
        let response = self.read_line().await?;
        match Self::status_code(&response)? {
            223 => Ok(true),
            430 => Ok(false),
            other => Err(NntpError::Transient(format!("unexpected STAT response {other}"))),
        }
    }

    /// Selects a group and runs `XOVER` over `range` (e.g. `"1-"` for
    /// everything), returning raw overview lines for the caller to filter
    /// by `Subject` as a fallback when a message id lookup misses.
    pub async fn xover(&mut self, group: &str, range: &str) -> Result<Vec<String>> {
        self.write_line(&format!("GROUP {group}")).await?;
        let response = self.read_line().await?;
        if Self::status_code(&response)? != 211 {
            return Err(NntpError::Transient(format!("GROUP failed: {response}")));
        }

        self.write_line(&format!("XOVER {range}")).await?;
        let response = self.read_line().await?;
        if Self::status_code(&response)? != 224 {
            return Err(NntpError::Transient(format!("XOVER failed: {response}")));
        }

        let body = self.read_multiline().await?;
        Ok(String::from_utf8_lossy(&body).lines().map(|l| l.to_string()).collect())
    }
}

fn classify_post_failure(subject: &str, code: u32, detail: &str) -> NntpError {
    if (400..500).contains(&code) {
        NntpError::Transient(detail.to_string())
    } else {
        NntpError::PermanentPostFailure { subject: subject.to_string(), detail: detail.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

    fn duplex() -> (tokio::io::DuplexStream, tokio::io::DuplexStream) {
        tokio::io::duplex(8192)
    }

    #[tokio::test]
    async fn handshake_succeeds_on_281() {
        let (client_io, mut server_io) = duplex();
        let mut conn = NntpConnection::new(client_io);

        let server = tokio::spawn(async move {
            server_io.write_all(b"200 welcome\r\n").await.unwrap();
            let mut buf = vec![0u8; 256];
            let _ = server_io.read(&mut buf).await.unwrap();
            server_io.write_all(b"381 password required\r\n").await.unwrap();
            let _ = server_io.read(&mut buf).await.unwrap();
            server_io.write_all(b"281 welcome alice\r\n").await.unwrap();
        });

        conn.handshake("news.example.org", "alice", "hunter2").await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_fails_with_auth_error_on_bad_greeting() {
        let (client_io, mut server_io) = duplex();
        let mut conn = NntpConnection::new(client_io);

        tokio::spawn(async move {
            server_io.write_all(b"400 go away\r\n").await.unwrap();
        });

        let err = conn.handshake("news.example.org", "alice", "hunter2").await.unwrap_err();
        assert!(matches!(err, NntpError::Auth { .. }));
    }

    #[tokio::test]
    async fn post_returns_ok_on_240() {
        let (client_io, mut server_io) = duplex();
        let mut conn = NntpConnection::new(client_io);

        let server = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            server_io.write_all(b"340 send article\r\n").await.unwrap();
            let _ = server_io.read(&mut buf).await.unwrap();
            server_io.write_all(b"240 posted ok\r\n").await.unwrap();
        });

        let article = Article {
            from: "a@b.invalid".into(),
            newsgroups: "alt.binaries.usync".into(),
            subject: "abcdefghijklmnopqrst".into(),
            message_id: "<uuid@deadbeef>".into(),
            body: b"ciphertext bytes".to_vec(),
        };
        conn.post(&article).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn article_maps_430_to_no_such_article() {
        let (client_io, mut server_io) = duplex();
        let mut conn = NntpConnection::new(client_io);

        tokio::spawn(async move {
            server_io.write_all(b"430 no such article\r\n").await.unwrap();
        });

        let err = conn.article("<missing@host>").await.unwrap_err();
        assert!(matches!(err, NntpError::NoSuchArticle));
    }
}
