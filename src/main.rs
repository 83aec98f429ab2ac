use clap::{Parser, Subcommand};
use dispatch::TransactionStream;
use eyre::{Result, WrapErr};
use handler::MemoryHandler;
use handlers::{DevMemHandler, ForwardHandler, NullHandler, TestMemHandler};
use std::path::PathBuf;

mod byteshim;
mod dispatch;
mod engine;
mod epoll;
mod fds;
mod handler;
mod handlers;
mod protocol;
mod ring;
mod server;
mod signals;
mod stream;
mod tty;

/// Default word capacity for each client's input/output ring buffer.
const DEFAULT_RING_CAPACITY: usize = 256;

/// Default maximum number of concurrent TCP clients.
const DEFAULT_MAX_CLIENTS: usize = 50;

/// IPbus v2 control-packet server.
#[derive(Debug, Parser)]
#[clap(version)]
struct Args {
	#[clap(subcommand)]
	command: Command,

	/// Increase log verbosity (repeatable).
	#[clap(short, long, global = true, action = clap::ArgAction::Count)]
	verbose: u8,

	/// Decrease log verbosity (repeatable).
	#[clap(short, long, global = true, action = clap::ArgAction::Count)]
	quiet: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Serve IPbus transactions over TCP.
	ServeTcp {
		/// TCP port to listen on.
		#[clap(long, default_value_t = 60002)]
		port: u16,

		/// Maximum number of simultaneous client connections.
		#[clap(long, default_value_t = DEFAULT_MAX_CLIENTS)]
		max_clients: usize,

		#[clap(flatten)]
		backend: Backend,

		/// Word capacity of each client's input/output ring buffer.
		#[clap(long, default_value_t = DEFAULT_RING_CAPACITY)]
		ring_capacity: usize,
	},
	/// Serve IPbus transactions over a pair of serial file descriptors.
	ServeSerial {
		/// Device to read transactions from.
		input: PathBuf,

		/// Device to write responses to (defaults to `input` if omitted).
		output: Option<PathBuf>,

		#[clap(flatten)]
		backend: Backend,

		/// Word capacity of the client's input/output ring buffer.
		#[clap(long, default_value_t = DEFAULT_RING_CAPACITY)]
		ring_capacity: usize,
	},
}

#[derive(Debug, clap::Args)]
struct Backend {
	/// Memory backend to dispatch transactions against.
	#[clap(long, value_enum, default_value_t = BackendKind::Test)]
	backend: BackendKind,

	/// Size, in bytes, of the anonymous memory block used by `--backend test`.
	#[clap(long, default_value_t = handlers::testmem::DEFAULT_SIZE)]
	test_size: usize,

	/// Serial device to forward transactions to, for `--backend forward`.
	#[clap(long)]
	forward_tx: Option<PathBuf>,

	/// Serial device to read forwarded responses from, for `--backend forward` (defaults to `--forward-tx`).
	#[clap(long)]
	forward_rx: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum BackendKind {
	/// An anonymous, process-local block of scratch memory.
	Test,
	/// `/dev/mem`, mapping real physical memory.
	Devmem,
	/// No backing store; logs transactions and returns placeholder data.
	Null,
	/// Forwards transactions along a serial bus instead of dispatching them locally.
	Forward,
}

fn main() -> Result<()> {
	let args = Args::parse();

	let level = match i16::from(args.verbose) - i16::from(args.quiet) {
		i16::MIN..=-2 => log::LevelFilter::Error,
		-1 => log::LevelFilter::Warn,
		0 => log::LevelFilter::Info,
		1 => log::LevelFilter::Debug,
		2..=i16::MAX => log::LevelFilter::Trace,
	};
	env_logger::Builder::new().filter_level(level).init();

	let shutdown = signals::catch_termination().wrap_err("installing signal handler failed")?;

	match args.command {
		Command::ServeTcp { port, max_clients, backend, ring_capacity } => {
			let transactions = build_transaction_stream(&backend)?;
			server::tcp::serve(port, max_clients, ring_capacity, transactions, shutdown).wrap_err("TCP server failed")?;
		},
		Command::ServeSerial { input, output, backend, ring_capacity } => {
			let transactions = build_transaction_stream(&backend)?;
			let output = output.unwrap_or_else(|| input.clone());
			server::serial::serve(&input, &output, ring_capacity, transactions, shutdown).wrap_err("serial server failed")?;
		},
	}

	Ok(())
}

/// Builds the pluggable transaction-handling step selected by `--backend`.
///
/// `test`/`devmem`/`null` all dispatch locally against a [`MemoryHandler`], boxed up as a [`TransactionStream`]
/// (see the blanket impl in [`dispatch`]); `forward` substitutes the whole step with a synchronous round trip to a
/// downstream serial bus (see [`handlers::forward`]), so it is built as a `TransactionStream` directly rather than
/// being forced through `MemoryHandler`.
fn build_transaction_stream(backend: &Backend) -> Result<Box<dyn TransactionStream>> {
	match backend.backend {
		BackendKind::Test => {
			let handler: Box<dyn MemoryHandler> = Box::new(TestMemHandler::new(backend.test_size).wrap_err("creating test memory")?);
			Ok(Box::new(handler))
		},
		BackendKind::Devmem => {
			let handler: Box<dyn MemoryHandler> = Box::new(DevMemHandler::new().wrap_err("mapping /dev/mem")?);
			Ok(Box::new(handler))
		},
		BackendKind::Null => {
			let handler: Box<dyn MemoryHandler> = Box::new(NullHandler);
			Ok(Box::new(handler))
		},
		BackendKind::Forward => {
			let tx_path = backend
				.forward_tx
				.as_ref()
				.ok_or_else(|| eyre::eyre!("--backend forward requires --forward-tx"))?;
			let rx_path = backend.forward_rx.as_ref().unwrap_or(tx_path);
			let tx = open_forward_device(tx_path)?;
			let rx = if rx_path == tx_path { open_forward_device(tx_path)? } else { open_forward_device(rx_path)? };
			Ok(Box::new(ForwardHandler::new(tx, rx)))
		},
	}
}

fn open_forward_device(path: &std::path::Path) -> Result<tty::RawTty> {
	use nix::fcntl::{open, OFlag};
	use nix::sys::stat::Mode;
	use std::os::unix::io::FromRawFd;

	let raw = open(path, OFlag::O_RDWR | OFlag::O_NOCTTY, Mode::empty())
		.wrap_err_with(|| format!("opening {}", path.display()))?;
	// Safety: open() returns a newly created file descriptor which we immediately wrap
	let fd = unsafe { fds::Fd::from_raw_fd(raw) };
	tty::RawTty::new(fd).wrap_err_with(|| format!("setting {} to raw mode", path.display()))
}
