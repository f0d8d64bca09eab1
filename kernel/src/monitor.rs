// =============================================================================
// A53 Boot - Debug Monitor
// =============================================================================
// Line-based prompt over the serial console. It uses only the console's
// byte-level entry points and never touches translation state directly.
// =============================================================================

use core::fmt;

use a53boot_arch::diag::{self, Hex};
use a53boot_arch::{cpu, irq, mmu, println, sysreg, uart};

use crate::ADDRESS_SPACE;

const PROMPT: &str = "a53> ";

/// Longest command line, including the NUL terminator.
const LINE_MAX: usize = 128;

/// Table entries shown by `tables`.
const DUMP_ENTRIES: usize = 4;

/// A parsed monitor command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Empty,
    Help,
    El,
    Mmu,
    Tables,
    Peek(u64),
    Poke(u64, u64),
    Echo(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError<'a> {
    Unknown(&'a str),
    MissingArgument(&'static str),
    BadNumber(&'a str),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Unknown(cmd) => write!(f, "unknown command '{}', try 'help'", cmd),
            ParseError::MissingArgument(what) => write!(f, "missing {}", what),
            ParseError::BadNumber(text) => write!(f, "'{}' is not a number", text),
        }
    }
}

/// Parse an unsigned number: `0x`/`0X` prefix for hex, decimal otherwise.
pub fn parse_number(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn number<'a>(arg: Option<&'a str>, what: &'static str) -> Result<u64, ParseError<'a>> {
    let text = arg.ok_or(ParseError::MissingArgument(what))?;
    parse_number(text).ok_or(ParseError::BadNumber(text))
}

/// Parse one command line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let line = line.trim();
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(Command::Empty);
    };

    match cmd {
        "help" | "?" => Ok(Command::Help),
        "el" => Ok(Command::El),
        "mmu" => Ok(Command::Mmu),
        "tables" => Ok(Command::Tables),
        "peek" => Ok(Command::Peek(number(parts.next(), "address")?)),
        "poke" => {
            let addr = number(parts.next(), "address")?;
            let value = number(parts.next(), "value")?;
            Ok(Command::Poke(addr, value))
        }
        "echo" => Ok(Command::Echo(line[cmd.len()..].trim_start())),
        other => Err(ParseError::Unknown(other)),
    }
}

/// Run the prompt forever.
pub fn run() -> ! {
    println!();
    println!("Debug monitor ready. Type 'help' for available commands.");

    let mut buf = [0u8; LINE_MAX];
    loop {
        uart::write_string(PROMPT);
        let len = uart::read_line(&mut buf);

        // Routed input is echoed as it is consumed; polled input is not
        if !irq::rx_interrupts_routed() {
            uart::write_string(core::str::from_utf8(&buf[..len]).unwrap_or(""));
            uart::write_string("\r\n");
        }

        match core::str::from_utf8(&buf[..len]) {
            Ok(line) => match parse(line) {
                Ok(command) => execute(command),
                Err(err) => println!("error: {}", err),
            },
            Err(_) => println!("error: input is not valid UTF-8"),
        }
    }
}

fn execute(command: Command<'_>) {
    match command {
        Command::Empty => {}
        Command::Help => show_help(),
        Command::El => {
            let el = cpu::current_el();
            println!("EL{} ({})", el.as_u8(), el.execution_state());
        }
        Command::Mmu => {
            let sctlr = sysreg::read_sctlr_el1();
            let state = if mmu::mmu_enabled(sctlr) { "on" } else { "off" };
            println!("MMU {} (SCTLR_EL1 = {})", state, Hex(sctlr));
            println!("TTBR0_EL1 = {}", Hex(sysreg::read_ttbr0_el1()));
        }
        Command::Tables => {
            let space = ADDRESS_SPACE.lock();
            diag::dump_table("level 1", space.level1().entries(), DUMP_ENTRIES);
            diag::dump_table("level 2", space.level2().entries(), DUMP_ENTRIES);
        }
        Command::Peek(addr) => {
            if addr % 8 != 0 {
                println!("error: {} is not 8-byte aligned", Hex(addr));
                return;
            }
            // SAFETY: operator supplied; a bad address faults, which is what
            // a debug monitor is for
            let value = unsafe { core::ptr::read_volatile(addr as *const u64) };
            println!("{}: {}", Hex(addr), Hex(value));
        }
        Command::Poke(addr, value) => {
            if addr % 8 != 0 {
                println!("error: {} is not 8-byte aligned", Hex(addr));
                return;
            }
            // SAFETY: see Peek
            unsafe { core::ptr::write_volatile(addr as *mut u64, value) };
            diag::print_address(addr);
        }
        Command::Echo(text) => println!("{}", text),
    }
}

fn show_help() {
    println!("Commands:");
    println!("  help                 show this list");
    println!("  el                   current exception level");
    println!("  mmu                  SCTLR_EL1.M and TTBR0_EL1");
    println!("  tables               first entries of both translation tables");
    println!("  peek <addr>          read a 64-bit word");
    println!("  poke <addr> <value>  write a 64-bit word");
    println!("  echo <text>          print text back");
}
