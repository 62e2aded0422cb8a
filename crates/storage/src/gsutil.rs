//! Object store access through the `gsutil` command line.
//!
//! `gsutil cp <uri> -` streams an object to stdout and `gsutil cp - <uri>`
//! uploads stdin. The child is awaited when its stream ends, so a failing
//! upload or download surfaces as an I/O error instead of a short copy.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use clusterlink_transfer::{BackendFuture, BoxedReader, BoxedWriter, ObjectStore};

use crate::StorageError;

type ExitFuture = Pin<Box<dyn Future<Output = io::Result<ExitStatus>> + Send>>;

/// [`ObjectStore`] backed by a `gsutil` executable.
#[derive(Debug, Clone)]
pub struct GsutilStore {
    program: String,
    args: Vec<String>,
}

impl GsutilStore {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before `cp`, e.g. `-q` or `-o Credentials:...`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn cp(&self, from: &str, to: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(["cp", from, to])
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }

    fn spawn(&self, mut cmd: Command) -> Result<Child, StorageError> {
        cmd.spawn().map_err(|source| StorageError::Spawn {
            program: self.program.clone(),
            source,
        })
    }
}

impl ObjectStore for GsutilStore {
    fn open_read<'a>(&'a self, uri: &'a str) -> BackendFuture<'a, BoxedReader> {
        Box::pin(async move {
            let mut cmd = self.cp(uri, "-");
            cmd.stdin(Stdio::null()).stdout(Stdio::piped());
            let mut child = self.spawn(cmd).map_err(|e| e.at(uri))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| StorageError::Io(io::Error::other("stdout not captured")).at(uri))?;
            debug!(program = %self.program, %uri, "reading object");

            Ok(Box::new(ChildReader {
                stdout,
                child: Some(child),
                exit: None,
                program: self.program.clone(),
            }) as BoxedReader)
        })
    }

    fn open_write<'a>(&'a self, uri: &'a str) -> BackendFuture<'a, BoxedWriter> {
        Box::pin(async move {
            let mut cmd = self.cp("-", uri);
            cmd.stdin(Stdio::piped()).stdout(Stdio::null());
            let mut child = self.spawn(cmd).map_err(|e| e.at(uri))?;
            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| StorageError::Io(io::Error::other("stdin not captured")).at(uri))?;
            debug!(program = %self.program, %uri, "writing object");

            Ok(Box::new(ChildWriter {
                stdin: Some(stdin),
                child: Some(child),
                exit: None,
                program: self.program.clone(),
            }) as BoxedWriter)
        })
    }
}

fn wait_for(mut child: Child) -> ExitFuture {
    Box::pin(async move { child.wait().await })
}

fn check_exit(program: &str, status: ExitStatus) -> io::Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{program} exited with {status}")))
    }
}

/// Child stdout that reports the exit status once drained.
struct ChildReader {
    stdout: ChildStdout,
    child: Option<Child>,
    exit: Option<ExitFuture>,
    program: String,
}

impl AsyncRead for ChildReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        if this.child.is_some() {
            let before = buf.filled().len();
            ready!(Pin::new(&mut this.stdout).poll_read(cx, buf))?;
            if buf.filled().len() > before {
                return Poll::Ready(Ok(()));
            }
            if let Some(child) = this.child.take() {
                this.exit = Some(wait_for(child));
            }
        }

        match this.exit.as_mut() {
            Some(exit) => {
                let status = ready!(exit.as_mut().poll(cx))?;
                this.exit = None;
                Poll::Ready(check_exit(&this.program, status))
            }
            None => Poll::Ready(Ok(())),
        }
    }
}

/// Child stdin whose shutdown closes the pipe and waits for the upload.
struct ChildWriter {
    stdin: Option<ChildStdin>,
    child: Option<Child>,
    exit: Option<ExitFuture>,
    program: String,
}

impl AsyncWrite for ChildWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut().stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_write(cx, buf),
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "upload already closed",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(stdin) = this.stdin.as_mut() {
            ready!(Pin::new(stdin).poll_shutdown(cx))?;
            // Dropping the handle closes the pipe.
            this.stdin = None;
        }
        if let Some(child) = this.child.take() {
            this.exit = Some(wait_for(child));
        }

        match this.exit.as_mut() {
            Some(exit) => {
                let status = ready!(exit.as_mut().poll(cx))?;
                this.exit = None;
                Poll::Ready(check_exit(&this.program, status))
            }
            None => Poll::Ready(Ok(())),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;

    use clusterlink_transfer::TransferError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Stand-in for gsutil serving `gs://` URIs from `<dir>/bucket`.
    const FAKE_GSUTIL: &str = r#"
root="$(dirname "$0")/bucket"
[ "$1" = "cp" ] || exit 2
if [ "$3" = "-" ]; then
  cat "$root/${2#gs://}"
else
  key="${3#gs://}"
  case "$key" in
    */reject) cat > /dev/null; exit 3 ;;
  esac
  mkdir -p "$(dirname "$root/$key")"
  cat > "$root/$key"
fi
"#;

    /// Runs the script through `sh` so nothing has to be made executable.
    fn fake_store(dir: &Path) -> GsutilStore {
        let script = dir.join("gsutil.sh");
        std::fs::write(&script, FAKE_GSUTIL).unwrap();
        GsutilStore::new("sh").with_args([script.to_string_lossy().to_string()])
    }

    #[tokio::test]
    async fn upload_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let store = fake_store(dir.path());

        let mut writer = store.open_write("gs://b/data/part-0").await.unwrap();
        writer.write_all(b"hello object").await.unwrap();
        writer.shutdown().await.unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("bucket/b/data/part-0")).unwrap(),
            b"hello object"
        );

        let mut reader = store.open_read("gs://b/data/part-0").await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello object");
    }

    #[tokio::test]
    async fn failed_download_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = fake_store(dir.path());

        let mut reader = store.open_read("gs://b/missing").await.unwrap();
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();
        assert!(err.to_string().contains("exited with"), "{err}");
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn failed_upload_surfaces_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = fake_store(dir.path());

        let mut writer = store.open_write("gs://b/reject").await.unwrap();
        writer.write_all(b"payload").await.unwrap();
        let err = writer.shutdown().await.unwrap_err();
        assert!(err.to_string().contains("exited with"), "{err}");
    }

    #[tokio::test]
    async fn missing_program_fails_to_open() {
        let store = GsutilStore::new("/nonexistent/gsutil");
        let err = match store.open_read("gs://b/k").await {
            Ok(_) => panic!("expected spawn failure"),
            Err(e) => e,
        };
        assert!(matches!(err, TransferError::Backend { ref location, .. } if location == "gs://b/k"));
    }

    #[test]
    fn args_precede_cp() {
        let store = GsutilStore::new("gsutil").with_args(["-q"]);
        let cmd = store.cp("gs://b/k", "-");
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(args, ["-q", "cp", "gs://b/k", "-"]);
        assert_eq!(store.program(), "gsutil");
    }
}
