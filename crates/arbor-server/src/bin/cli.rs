//! Interactive line client for `arbor-server`.
//!
//! Usage: `arbor-cli [host:port]`. Input is collected until a line ends
//! with `;`, sent as one request, and the reply is printed up to `END`.

use std::env;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;

use arbor_server::{unescape_line, END_MARKER};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

fn main() {
    let addr = env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let stream = match TcpStream::connect(&addr) {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Error connecting to {}: {}", addr, e);
            process::exit(1);
        }
    };
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let mut reader = BufReader::new(stream);

    println!("ArborDB client v{}", env!("CARGO_PKG_VERSION"));
    println!("Connected to {}. End statements with \";\", \"help;\" for usage.", addr);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "arbor> " } else { "  ...> " };
        print!("{}", prompt);
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(trimmed);
        if !buffer.ends_with(';') {
            continue;
        }

        let request = std::mem::take(&mut buffer);
        let exiting = request
            .trim_end_matches(';')
            .trim()
            .eq_ignore_ascii_case("exit");
        if let Err(e) = writeln!(writer, "{}", request) {
            eprintln!("Error sending request: {}", e);
            break;
        }
        match print_response(&mut reader) {
            Ok(true) if exiting => break,
            Ok(true) => {}
            Ok(false) => {
                println!("Connection closed by server.");
                break;
            }
            Err(e) => {
                eprintln!("Error reading response: {}", e);
                break;
            }
        }
    }
}

/// Prints response lines up to the end marker. Returns `false` on EOF.
fn print_response(reader: &mut impl BufRead) -> io::Result<bool> {
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line == END_MARKER {
            return Ok(true);
        }
        println!("{}", unescape_line(line));
    }
}
