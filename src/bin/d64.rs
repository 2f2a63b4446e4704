//! Interactive D64 console application

use d64burner::burner::format_status;
use d64burner::filesystem::read_file;
use d64burner::map::draw_sector_map;
use d64burner::*;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

/// Command completer for the REPL
struct CommandCompleter {
    commands: Vec<&'static str>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: vec![
                "add",
                "burn",
                "clear-files",
                "create",
                "dir",
                "exit",
                "files",
                "flash-status",
                "generate",
                "help",
                "info",
                "load",
                "map",
                "open",
                "port",
                "quick-burn",
                "quit",
                "read-file",
                "read-sector",
                "rename",
                "save",
                "test-read",
                "test-write",
                "verify",
            ],
        }
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Only the command name is completed
        let line_to_cursor = &line[..pos];
        if line_to_cursor.contains(' ') {
            return Ok((pos, vec![]));
        }

        let prefix = line_to_cursor.to_lowercase();
        let matches: Vec<Pair> = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(&prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}
impl Validator for CommandCompleter {}
impl Helper for CommandCompleter {}

/// The programmer link selected with `port`
enum Link {
    Tcp(TcpTransport),
    Emulator(EmulatedBurner),
}

impl Link {
    fn describe(&self, config: &BurnerConfig) -> String {
        match self {
            Link::Tcp(_) => format!("{} ({})", config.port, config.line),
            Link::Emulator(_) => "built-in emulator".to_string(),
        }
    }

    /// Closed link of the same kind; the emulator keeps its flash contents
    fn fallback(&self) -> Link {
        match self {
            Link::Tcp(_) => Link::Tcp(TcpTransport::new()),
            Link::Emulator(e) => Link::Emulator(e.clone()),
        }
    }
}

impl Transport for Link {
    fn open(&mut self, port: &str, line: &LineSettings) -> io::Result<()> {
        match self {
            Link::Tcp(t) => t.open(port, line),
            Link::Emulator(e) => e.open(port, line),
        }
    }

    fn send_buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Link::Tcp(t) => t.send_buffer(bytes),
            Link::Emulator(e) => e.send_buffer(bytes),
        }
    }

    fn is_data_available(&mut self) -> io::Result<bool> {
        match self {
            Link::Tcp(t) => t.is_data_available(),
            Link::Emulator(e) => e.is_data_available(),
        }
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        match self {
            Link::Tcp(t) => t.read_byte(),
            Link::Emulator(e) => e.read_byte(),
        }
    }

    fn close(&mut self) {
        match self {
            Link::Tcp(t) => t.close(),
            Link::Emulator(e) => e.close(),
        }
    }
}

/// Get the path to the history file
fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".d64burner_history");
        p
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("=== D64 Burner ===");
    println!("Interactive console for building D64 images and burning them to flash.");
    println!("Type 'help' for available commands\n");

    let mut rl = Editor::new().expect("Failed to create editor");
    rl.set_helper(Some(CommandCompleter::new()));

    if let Some(history_path) = history_path() {
        let _ = rl.load_history(&history_path);
    }

    let mut burner = match BurnerConfig::from_env() {
        Ok(config) => Burner::new(config),
        Err(e) => {
            println!("Error: {} (using defaults)", e);
            Burner::default()
        }
    };
    let mut link = Some(Link::Tcp(TcpTransport::new()));
    let mut image: Option<DiskImage> = None;
    let mut programs: Vec<ProgramFile> = Vec::new();

    loop {
        let readline = rl.readline("> ");
        let input = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let _ = rl.add_history_entry(input);

        let parts = parse_command_line(input);
        if parts.is_empty() {
            continue;
        }
        let command = parts[0].to_lowercase();

        match command.as_str() {
            "help" => {
                print_help();
            }
            "quit" | "exit" => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                println!("Goodbye!");
                break;
            }
            "create" => {
                let size = match parts.get(1) {
                    Some(tracks) => match tracks.parse().ok().and_then(DiskSize::from_track_count) {
                        Some(size) => size,
                        None => {
                            println!("Usage: create [35..40]");
                            continue;
                        }
                    },
                    None => DiskSize::Standard,
                };
                let img = DiskImage::format(size);
                println!("Created new {} image", img.size().name());
                image = Some(img);
            }
            "open" | "load" => {
                if parts.len() < 2 {
                    println!("Usage: open <path>");
                    continue;
                }
                match DiskImage::open(&parts[1]) {
                    Ok(img) => {
                        println!("Opened: {} ({})", parts[1], img.size().name());
                        image = Some(img);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "save" => {
                let Some(ref mut img) = image else {
                    println!("No image loaded.");
                    continue;
                };
                let path = match parts.get(1) {
                    Some(path) => path.clone(),
                    None => match img.filename() {
                        Some(name) => name.to_string(),
                        None => {
                            println!("Usage: save <path>");
                            continue;
                        }
                    },
                };
                if !d64burner::io::is_d64_file(&path) {
                    println!("Warning: '{}' does not have a .d64 extension", path);
                }
                match img.save(&path) {
                    Ok(()) => println!("Saved: {}", path),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "info" => {
                if let Some(ref img) = image {
                    print_info(img);
                } else {
                    println!("No image loaded. Use 'open <path>' or 'create' first.");
                }
            }
            "dir" | "ls" => {
                if let Some(ref img) = image {
                    print_directory(img);
                } else {
                    println!("No image loaded.");
                }
            }
            "map" => {
                if let Some(ref img) = image {
                    draw_sector_map(img);
                } else {
                    println!("No image loaded.");
                }
            }
            "read-sector" => {
                let Some(ref img) = image else {
                    println!("No image loaded.");
                    continue;
                };
                if parts.len() < 3 {
                    println!("Usage: read-sector <track> <sector>");
                    continue;
                }
                let (Some(track), Some(sector)) = (parse_hex_or_dec(&parts[1]), parse_hex_or_dec(&parts[2]))
                else {
                    println!("Track and sector must be numbers.");
                    continue;
                };
                if !img.contains(track, sector) {
                    println!(
                        "Track {} sector {} is outside this {}-track image.",
                        track,
                        sector,
                        img.track_count()
                    );
                    continue;
                }
                let data = img.read_sector(track, sector).data();
                let (next_track, next_sector) = img.read_sector(track, sector).link();
                println!(
                    "Track {} sector {} (link {},{}):",
                    track, sector, next_track, next_sector
                );
                print_hex_dump(data, 256);
            }
            "read-file" => {
                let Some(ref img) = image else {
                    println!("No image loaded.");
                    continue;
                };
                if parts.len() < 2 {
                    println!("Usage: read-file <name|#index>");
                    continue;
                }
                match find_entry(img, &parts[1]) {
                    Some(entry) => {
                        let data = read_file(img, entry);
                        println!("\"{}\" ({} bytes):", entry.title, data.len());
                        print_hex_dump(&data, 512);
                    }
                    None => println!("File not found: {}", parts[1]),
                }
            }
            "add" => {
                if parts.len() < 2 {
                    println!("Usage: add <path> [name]");
                    continue;
                }
                let program = ProgramFile::open(&parts[1]).and_then(|p| match parts.get(2) {
                    Some(name) => p.with_name(name),
                    None => Ok(p),
                });
                match program {
                    Ok(program) => {
                        println!(
                            "Added \"{}\" ({} bytes, {} blocks)",
                            program.name(),
                            program.size(),
                            program.estimated_sectors()
                        );
                        programs.push(program);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "rename" => {
                if parts.len() < 3 {
                    println!("Usage: rename <index> <name>");
                    continue;
                }
                let Some(program) = parts[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| programs.get_mut(i))
                else {
                    println!("No file at index {}. Use 'files' to list them.", parts[1]);
                    continue;
                };
                match program.set_name(&parts[2]) {
                    Ok(()) => println!("Renamed to \"{}\"", program.name()),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "files" => {
                list_programs(&programs);
            }
            "clear-files" => {
                programs.clear();
                println!("File list cleared.");
            }
            "generate" => {
                let Some(ref mut img) = image else {
                    println!("No image loaded. Use 'create' first.");
                    continue;
                };
                if programs.is_empty() {
                    println!("No files added. Use 'add <path>' first.");
                    continue;
                }
                let name = match parts.get(1) {
                    Some(name) => name.clone(),
                    None if !img.disk_name().is_empty() => img.disk_name().to_string(),
                    None => "NEW DISK".to_string(),
                };
                match img.generate(&programs, &name) {
                    Ok(report) => println!(
                        "Packed {} files into {} data and {} directory sectors, {} blocks free",
                        report.files, report.data_sectors, report.directory_sectors, report.blocks_free
                    ),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "port" => {
                match parts.get(1).map(|p| p.to_lowercase()) {
                    None => {}
                    Some(choice) if choice == "emulator" => {
                        link = Some(Link::Emulator(EmulatedBurner::new(DiskSize::Extended40)));
                    }
                    Some(_) => {
                        let mut config = burner.config().clone();
                        config.port = parts[1].clone();
                        burner.set_config(config);
                        link = Some(Link::Tcp(TcpTransport::new()));
                    }
                }
                if let Some(ref current) = link {
                    println!("Port: {}", current.describe(burner.config()));
                    println!("Timeout: {:?}", burner.config().timeout);
                }
            }
            "burn" | "quick-burn" => {
                let Some(ref img) = image else {
                    println!("No image loaded.");
                    continue;
                };
                let mode = if command == "burn" {
                    BurnMode::Full
                } else {
                    BurnMode::Quick
                };
                let kind = JobKind::Burn {
                    image: img.clone(),
                    mode,
                };
                if let Some(JobOutcome::Burned(report)) = run_job(&burner, &mut link, kind) {
                    println!("{}", report);
                }
            }
            "verify" => {
                let size = image.as_ref().map(|img| img.size()).unwrap_or_default();
                if let Some(JobOutcome::Verified(img, report)) =
                    run_job(&burner, &mut link, JobKind::Verify { size })
                {
                    println!("{}", report);
                    println!("Disk name: \"{}\", {} files", img.disk_name(), img.directory().len());
                    image = Some(img);
                }
            }
            "flash-status" => {
                if let Some(JobOutcome::FlashStatus(status)) =
                    run_job(&burner, &mut link, JobKind::FlashStatus)
                {
                    println!("Flash status: {} (0x{:02X})", format_status(status), status);
                }
            }
            "test-write" => {
                if let Some(JobOutcome::TestWritten) = run_job(&burner, &mut link, JobKind::WriteTest) {
                    println!("Test byte written.");
                }
            }
            "test-read" => {
                if let Some(JobOutcome::TestByte(value)) = run_job(&burner, &mut link, JobKind::ReadTest) {
                    println!("Test byte: 0x{:02X}", value);
                }
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for available commands.", command);
            }
        }
    }
}

/// Run an operation in the background, printing progress until it finishes
fn run_job(burner: &Burner, link: &mut Option<Link>, kind: JobKind) -> Option<JobOutcome> {
    if burner.is_busy() {
        println!("Another operation is in progress.");
        return None;
    }
    let Some(transport) = link.take() else {
        println!("No port selected. Use 'port <address>' or 'port emulator'.");
        return None;
    };

    let fallback = transport.fallback();
    let mut job = match BurnJob::spawn(burner, transport, kind) {
        Ok(job) => job,
        Err(e) => {
            println!("Error: {}", e);
            *link = Some(fallback);
            return None;
        }
    };

    let mut shown = false;
    loop {
        let finished = job.is_finished();
        if let Some(progress) = job.progress() {
            print!(
                "\r{:<14} {} ({} %)   ",
                progress.state.to_string(),
                progress,
                progress.percent()
            );
            let _ = io::stdout().flush();
            shown = true;
        }
        if finished {
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }
    if shown {
        println!();
    }

    let finished = job.join();
    *link = Some(finished.transport);
    match finished.outcome {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            println!("Error: {}", e);
            None
        }
    }
}

/// Parse command line input, respecting quoted strings
fn parse_command_line(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

fn print_help() {
    println!("Available commands:");
    println!("  create [35..40]                - Create a blank image (default 35 tracks)");
    println!("  open <path>                    - Open a D64 image file (use quotes for paths with spaces)");
    println!("  save [path]                    - Save image to file (defaults to the opened filename)");
    println!("  info                           - Show disk information");
    println!("  dir                            - List the directory (ls)");
    println!("  map                            - Visual sector map (yellow=directory track)");
    println!("  read-sector <track> <sector>   - Hex dump a sector");
    println!("  read-file <name|#index>        - Hex dump a file from the directory");
    println!("  add <path> [name]              - Add a PRG file to the pack list");
    println!("  rename <index> <name>          - Rename a file in the pack list");
    println!("  files                          - Show the pack list");
    println!("  clear-files                    - Empty the pack list");
    println!("  generate [disk name]           - Pack the file list into the image");
    println!("  port [address|emulator]        - Show or select the programmer link");
    println!("  burn                           - Erase and burn every sector");
    println!("  quick-burn                     - Erase and burn only sectors holding data");
    println!("  verify                         - Read the flash back into the image");
    println!("  flash-status                   - Read the flash status register");
    println!("  test-write                     - Write the programmer test byte");
    println!("  test-read                      - Read the programmer test byte");
    println!("  help                           - Show this help");
    println!("  quit, exit                     - Exit");
}

fn print_info(image: &DiskImage) {
    if let Some(filename) = image.filename() {
        println!("Filename: {}", filename);
    }
    println!("Format: {}", image.size().name());
    println!("Tracks: {}", image.track_count());
    println!("Total sectors: {}", image.total_sectors());
    println!("Disk name: \"{}\"", image.disk_name());
    println!("Disk ID: {}", image.header().id_string());
    println!("DOS version: 0x{:02X}", image.dos_version());
    println!("Blocks free (BAM): {}", image.header().blocks_free());
    println!(
        "Empty sectors: {} ({:.1} %)",
        image.free_sector_count(),
        image.free_percent()
    );
    println!("Files: {}", image.directory().len());
    println!("Changed: {}", if image.is_changed() { "Yes" } else { "No" });
}

fn print_directory(image: &DiskImage) {
    println!("0 \"{:<16}\" {}", image.disk_name(), image.header().id_string());
    for entry in image.directory() {
        let quoted = format!("\"{}\"", entry.title);
        println!("{:<5} {:<18} {}", entry.blocks, quoted, entry.file_type);
    }
    println!("{} BLOCKS FREE.", image.header().blocks_free());
}

fn list_programs(programs: &[ProgramFile]) {
    if programs.is_empty() {
        println!("No files added.");
        return;
    }
    println!("{:<6} {:<18} {:<8} {:<6}", "Index", "Name", "Bytes", "Blocks");
    println!("{}", "-".repeat(41));
    for (i, program) in programs.iter().enumerate() {
        println!(
            "{:<6} {:<18} {:<8} {:<6}",
            i,
            program.name(),
            program.size(),
            program.estimated_sectors()
        );
    }
    let blocks: usize = programs.iter().map(|p| p.estimated_sectors()).sum();
    println!("{} files, {} blocks", programs.len(), blocks);
}

fn find_entry<'a>(image: &'a DiskImage, key: &str) -> Option<&'a DirEntry> {
    if let Some(index) = key.strip_prefix('#') {
        return index.parse::<usize>().ok().and_then(|i| image.directory().get(i));
    }
    image
        .directory()
        .iter()
        .find(|e| e.title.eq_ignore_ascii_case(key))
}

fn print_hex_dump(data: &[u8], max_bytes: usize) {
    let len = data.len().min(max_bytes);

    for (i, chunk) in data[..len].chunks(16).enumerate() {
        print!("{:04X}: ", i * 16);

        for (j, byte) in chunk.iter().enumerate() {
            print!("{:02X} ", byte);
            if j == 7 {
                print!(" ");
            }
        }

        // Pad a short final row
        for j in chunk.len()..16 {
            print!("   ");
            if j == 7 {
                print!(" ");
            }
        }

        print!(" |");

        for byte in chunk {
            let c = if (32..127).contains(byte) {
                *byte as char
            } else {
                '.'
            };
            print!("{}", c);
        }

        println!("|");
    }

    if data.len() > max_bytes {
        println!("... ({} more bytes)", data.len() - max_bytes);
    }
}

fn parse_hex_or_dec(s: &str) -> Option<u8> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}
