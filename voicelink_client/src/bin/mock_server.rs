use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use voicelink_protocol::{CommandAssembler, OutboundCommand};

const DEFAULT_ADDR: &str = "127.0.0.1:0";

/// What the client has told us so far.
#[derive(Debug, Default)]
struct MirroredState {
    language: Option<String>,
    config: BTreeMap<String, bool>,
    listen: bool,
    listen_shouts: bool,
    options: Vec<String>,
    favorites: [usize; 5],
}

impl MirroredState {
    fn apply(&mut self, cmd: OutboundCommand) {
        match cmd {
            OutboundCommand::Lang { code } => self.language = Some(code),
            OutboundCommand::Options { options } => self.options = options,
            OutboundCommand::Close => self.options.clear(),
            OutboundCommand::Listen { on } => self.listen = on,
            OutboundCommand::ListenShouts { on } => self.listen_shouts = on,
            OutboundCommand::Config { flag, on } => {
                self.config.insert(flag.wire_name().to_string(), on);
            }
            OutboundCommand::Favorites { snapshot } => self.favorites = snapshot.counts(),
        }
    }
}

fn parse_arg_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_arg_values(args: &[String], name: &str) -> Vec<String> {
    args.windows(2)
        .filter(|w| w[0] == name)
        .map(|w| w[1].clone())
        .collect()
}

fn expired(start: Instant, run_for: Option<Duration>) -> bool {
    run_for.is_some_and(|max| start.elapsed() >= max)
}

fn serve(mut stream: TcpStream, send: &[String], start: Instant, run_for: Option<Duration>) {
    let _ = stream.set_read_timeout(Some(Duration::from_millis(50)));
    let _ = stream.set_nodelay(true);

    for line in send {
        if let Err(e) = stream.write_all(format!("{line}\n").as_bytes()) {
            eprintln!("send failed: {e}");
            return;
        }
        println!("sent {line}");
    }

    let mut assembler = CommandAssembler::new();
    let mut state = MirroredState::default();
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4096];

    while !expired(start, run_for) {
        match stream.read(&mut buf) {
            Ok(0) => {
                println!("client disconnected");
                return;
            }
            Ok(n) => pending.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                continue;
            }
            Err(e) => {
                eprintln!("read failed: {e}");
                return;
            }
        }

        while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            println!("recv {line}");
            if let Some(cmd) = assembler.feed(line) {
                state.apply(cmd);
                println!("state {state:?}");
            }
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let addr = parse_arg_value(&args, "--addr")
        .or_else(|| std::env::var("VOICELINK_MOCK_ADDR").ok())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let addr_file = parse_arg_value(&args, "--addr-file").map(PathBuf::from);
    let run_for = parse_arg_value(&args, "--run-for-ms")
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis);
    let send = parse_arg_values(&args, "--send");

    let listener = match TcpListener::bind(&addr) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("bind {addr} failed: {e}");
            std::process::exit(1);
        }
    };
    let local = match listener.local_addr() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = listener.set_nonblocking(true) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    if let Some(path) = &addr_file {
        let _ = fs::write(path, local.to_string());
    }

    println!("mock_server listening on {local}");

    let start = Instant::now();
    while !expired(start, run_for) {
        match listener.accept() {
            Ok((stream, peer)) => {
                println!("client connected from {peer}");
                if stream.set_nonblocking(false).is_ok() {
                    serve(stream, &send, start, run_for);
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(33));
            }
            Err(e) => {
                eprintln!("accept failed: {e}");
                thread::sleep(Duration::from_millis(33));
            }
        }
    }
}
