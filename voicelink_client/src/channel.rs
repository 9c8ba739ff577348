use crate::config::Endpoint;
use crate::error::ChannelError;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const READ_CHUNK: usize = 4096;

/// Raw byte transport under a [`LineChannel`].
pub trait Duplex: Send {
    /// Appends whatever bytes are available without blocking and returns how
    /// many were added. `Ok(0)` means nothing is pending right now.
    fn poll_read(&mut self, buf: &mut Vec<u8>) -> Result<usize, ChannelError>;
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ChannelError>;
    fn close(&mut self);
}

/// Anything a sync pass can write protocol lines into.
pub trait LineSink {
    fn write_line(&mut self, line: &str) -> Result<(), ChannelError>;
}

enum Chunk {
    Data(Vec<u8>),
    Eof,
    Failed(std::io::Error),
}

/// Duplex over a blocking stream: a helper thread performs the reads and hands
/// chunks over, so the owner can poll without blocking.
pub struct StreamDuplex {
    writer: Box<dyn Write + Send>,
    chunks: Receiver<Chunk>,
    closer: Option<Box<dyn FnOnce() + Send>>,
    eof_pending: bool,
}

impl StreamDuplex {
    fn spawn<R, W>(reader: R, writer: W, closer: Option<Box<dyn FnOnce() + Send>>) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (tx, rx) = unbounded();
        thread::spawn(move || pump(reader, tx));
        Self {
            writer: Box::new(writer),
            chunks: rx,
            closer,
            eof_pending: false,
        }
    }
}

fn pump<R: Read>(mut reader: R, tx: Sender<Chunk>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                let _ = tx.send(Chunk::Eof);
                return;
            }
            Ok(n) => {
                if tx.send(Chunk::Data(buf[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                let _ = tx.send(Chunk::Failed(e));
                return;
            }
        }
    }
}

impl Duplex for StreamDuplex {
    fn poll_read(&mut self, buf: &mut Vec<u8>) -> Result<usize, ChannelError> {
        if self.eof_pending {
            return Err(ChannelError::Closed);
        }
        let mut added = 0;
        loop {
            match self.chunks.try_recv() {
                Ok(Chunk::Data(bytes)) => {
                    added += bytes.len();
                    buf.extend_from_slice(&bytes);
                }
                Ok(Chunk::Eof) | Err(TryRecvError::Disconnected) => {
                    if added > 0 {
                        // Hand out the tail first; report the close next time.
                        self.eof_pending = true;
                        return Ok(added);
                    }
                    return Err(ChannelError::Closed);
                }
                Ok(Chunk::Failed(e)) => return Err(ChannelError::Read(e)),
                Err(TryRecvError::Empty) => return Ok(added),
            }
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.writer.write_all(bytes).map_err(ChannelError::Write)?;
        self.writer.flush().map_err(ChannelError::Write)
    }

    fn close(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl Drop for StreamDuplex {
    fn drop(&mut self) {
        self.close();
    }
}

/// Byte stream that can report how many bytes are readable right now.
pub trait PeekStream: Read + Write + Send {
    fn available(&mut self) -> std::io::Result<usize>;
}

/// Duplex over a single handle that only reads what is already pending, so a
/// read never holds the handle while a write is waiting.
pub struct PeekDuplex<S: PeekStream> {
    stream: Option<S>,
}

impl<S: PeekStream> PeekDuplex<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
        }
    }
}

impl<S: PeekStream> Duplex for PeekDuplex<S> {
    fn poll_read(&mut self, buf: &mut Vec<u8>) -> Result<usize, ChannelError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ChannelError::Closed);
        };
        let avail = stream.available().map_err(ChannelError::Read)?;
        if avail == 0 {
            return Ok(0);
        }
        let start = buf.len();
        buf.resize(start + avail, 0);
        match stream.read(&mut buf[start..]) {
            Ok(0) => {
                buf.truncate(start);
                Err(ChannelError::Closed)
            }
            Ok(n) => {
                buf.truncate(start + n);
                Ok(n)
            }
            Err(e) => {
                buf.truncate(start);
                Err(ChannelError::Read(e))
            }
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ChannelError::Closed);
        };
        stream.write_all(bytes).map_err(ChannelError::Write)?;
        stream.flush().map_err(ChannelError::Write)
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(windows)]
mod pipe {
    use super::PeekStream;
    use std::fs::File;
    use std::io::{self, Read, Write};
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::System::Pipes::PeekNamedPipe;

    /// Client end of a byte-mode named pipe opened without overlapped I/O.
    pub struct NamedPipe(pub File);

    impl Read for NamedPipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Write for NamedPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.0.flush()
        }
    }

    impl PeekStream for NamedPipe {
        fn available(&mut self) -> io::Result<usize> {
            let mut avail: u32 = 0;
            // SAFETY: the handle stays open for the call; only the total count
            // is requested, so no buffer is passed.
            let ok = unsafe {
                PeekNamedPipe(
                    self.0.as_raw_handle() as HANDLE,
                    std::ptr::null_mut(),
                    0,
                    std::ptr::null_mut(),
                    &mut avail,
                    std::ptr::null_mut(),
                )
            };
            if ok == 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(avail as usize)
        }
    }
}

impl Endpoint {
    pub fn connect(&self) -> Result<Box<dyn Duplex>, ChannelError> {
        match self {
            Endpoint::Tcp(addr) => {
                let stream =
                    TcpStream::connect_timeout(addr, CONNECT_TIMEOUT).map_err(ChannelError::Connect)?;
                let _ = stream.set_nodelay(true);
                let reader = stream.try_clone().map_err(ChannelError::Connect)?;
                let closer = stream.try_clone().map_err(ChannelError::Connect)?;
                Ok(Box::new(StreamDuplex::spawn(
                    reader,
                    stream,
                    Some(Box::new(move || {
                        let _ = closer.shutdown(Shutdown::Both);
                    })),
                )))
            }
            #[cfg(windows)]
            Endpoint::NamedPipe(path) => {
                let file = std::fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(ChannelError::Connect)?;
                Ok(Box::new(PeekDuplex::new(pipe::NamedPipe(file))))
            }
            #[cfg(not(windows))]
            Endpoint::NamedPipe(path) => Err(ChannelError::Connect(std::io::Error::new(
                ErrorKind::Unsupported,
                format!("named pipes need Windows: {}", path.display()),
            ))),
        }
    }
}

/// Newline-framed text channel with a receive accumulator.
///
/// Any failure leaves the channel detached; the caller reconnects rather than
/// retrying the same handle.
#[derive(Default)]
pub struct LineChannel {
    duplex: Option<Box<dyn Duplex>>,
    recv_buf: Vec<u8>,
}

impl LineChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.duplex.is_some()
    }

    pub fn attach(&mut self, duplex: Box<dyn Duplex>) {
        self.close();
        self.duplex = Some(duplex);
    }

    /// Returns the next complete line, pulling pending bytes if none is
    /// buffered yet. A partial line stays buffered and yields `Ok(None)`.
    pub fn try_read_line(&mut self) -> Result<Option<String>, ChannelError> {
        if let Some(line) = self.take_buffered_line() {
            return Ok(Some(line));
        }
        let Some(duplex) = self.duplex.as_mut() else {
            return Err(ChannelError::NotConnected);
        };
        match duplex.poll_read(&mut self.recv_buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(self.take_buffered_line()),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn take_buffered_line(&mut self) -> Option<String> {
        let pos = self.recv_buf.iter().position(|b| *b == b'\n')?;
        let raw: Vec<u8> = self.recv_buf.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&raw[..pos]);
        Some(text.trim_end_matches('\r').to_string())
    }

    pub fn close(&mut self) {
        if let Some(mut duplex) = self.duplex.take() {
            duplex.close();
        }
        self.recv_buf.clear();
    }
}

impl LineSink for LineChannel {
    fn write_line(&mut self, line: &str) -> Result<(), ChannelError> {
        let Some(duplex) = self.duplex.as_mut() else {
            return Err(ChannelError::NotConnected);
        };
        let mut payload = Vec::with_capacity(line.len() + 1);
        payload.extend_from_slice(line.as_bytes());
        payload.push(b'\n');
        if let Err(e) = duplex.write_all(&payload) {
            self.close();
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted {
        reads: VecDeque<Result<Vec<u8>, ()>>,
        written: Vec<u8>,
    }

    impl Duplex for Scripted {
        fn poll_read(&mut self, buf: &mut Vec<u8>) -> Result<usize, ChannelError> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    buf.extend_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(())) => Err(ChannelError::Closed),
                None => Ok(0),
            }
        }
        fn write_all(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
            self.written.extend_from_slice(bytes);
            Ok(())
        }
        fn close(&mut self) {}
    }

    fn channel(reads: Vec<Result<&[u8], ()>>) -> LineChannel {
        let mut ch = LineChannel::new();
        ch.attach(Box::new(Scripted {
            reads: reads.into_iter().map(|r| r.map(<[u8]>::to_vec)).collect(),
            written: Vec::new(),
        }));
        ch
    }

    #[test]
    fn partial_line_waits_for_terminator() {
        let mut ch = channel(vec![Ok(&b"RES|1|0"[..]), Ok(&b".5\r\nDBG|x\n"[..])]);
        assert_eq!(ch.try_read_line().unwrap(), None);
        assert_eq!(ch.try_read_line().unwrap().as_deref(), Some("RES|1|0.5"));
        assert_eq!(ch.try_read_line().unwrap().as_deref(), Some("DBG|x"));
        assert_eq!(ch.try_read_line().unwrap(), None);
    }

    /// Pipe end whose `read` would block when nothing is pending.
    #[derive(Clone, Default)]
    struct FakePipe {
        inbound: std::sync::Arc<std::sync::Mutex<VecDeque<u8>>>,
        written: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
    }

    impl Read for FakePipe {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut inbound = self.inbound.lock().unwrap();
            assert!(!inbound.is_empty(), "read with nothing pending would block");
            let n = buf.len().min(inbound.len());
            for (dst, src) in buf.iter_mut().zip(inbound.drain(..n)) {
                *dst = src;
            }
            Ok(n)
        }
    }

    impl Write for FakePipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl PeekStream for FakePipe {
        fn available(&mut self) -> std::io::Result<usize> {
            Ok(self.inbound.lock().unwrap().len())
        }
    }

    #[test]
    fn peek_duplex_writes_while_nothing_is_pending() {
        let pipe = FakePipe::default();
        let mut ch = LineChannel::new();
        ch.attach(Box::new(PeekDuplex::new(pipe.clone())));

        assert_eq!(ch.try_read_line().unwrap(), None);
        ch.write_line("LANG|en").unwrap();
        ch.write_line("CFG|OPEN|1").unwrap();
        assert_eq!(&pipe.written.lock().unwrap()[..], &b"LANG|en\nCFG|OPEN|1\n"[..]);

        pipe.inbound.lock().unwrap().extend(b"RES|0|0.7\n");
        assert_eq!(ch.try_read_line().unwrap().as_deref(), Some("RES|0|0.7"));
        assert_eq!(ch.try_read_line().unwrap(), None);
    }

    #[test]
    fn closed_peek_duplex_refuses_io() {
        let mut duplex = PeekDuplex::new(FakePipe::default());
        duplex.close();
        assert!(matches!(duplex.write_all(b"CLOSE\n"), Err(ChannelError::Closed)));
        assert!(matches!(duplex.poll_read(&mut Vec::new()), Err(ChannelError::Closed)));
    }

    #[test]
    fn read_failure_detaches() {
        let mut ch = channel(vec![Err(())]);
        assert!(ch.try_read_line().is_err());
        assert!(!ch.is_connected());
        assert!(matches!(ch.write_line("CLOSE"), Err(ChannelError::NotConnected)));
    }
}
