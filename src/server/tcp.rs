use crate::dispatch::TransactionStream;
use crate::engine::ClientEngine;
use crate::epoll::{Epoll, Event, Interest};
use crate::fds::Fd;
use log::{info, warn};
use slab::Slab;
use std::io::{ErrorKind, Result};
use std::net::{TcpListener, TcpStream};

const LISTENER_KEY: u64 = u64::MAX;
const SHUTDOWN_KEY: u64 = u64::MAX - 1;

struct Client {
	sock: TcpStream,
	engine: ClientEngine,
}

/// Run a TCP IPbus server on `port` until `shutdown` becomes readable.
///
/// Accepts up to `max_clients` concurrent connections; beyond that, new connections are accepted and immediately
/// dropped, matching the original's fixed-size client table. `handler` is shared by every connected client, same as
/// the original's single global `membase`.
pub fn serve(
	port: u16,
	max_clients: usize,
	ring_capacity: usize,
	mut handler: Box<dyn TransactionStream>,
	shutdown: Fd,
) -> Result<()> {
	let epoll = Epoll::new()?;

	let listener = TcpListener::bind(("0.0.0.0", port))?;
	listener.set_nonblocking(true)?;
	epoll.register(&listener, Interest::EPOLLIN, LISTENER_KEY)?;
	epoll.register(&shutdown, Interest::EPOLLIN, SHUTDOWN_KEY)?;
	info!("serving IPbus over TCP on port {port}");

	let mut clients: Slab<Client> = Slab::with_capacity(max_clients);
	let mut events = vec![Event::empty(); max_clients + 2];

	'accept: loop {
		let activity = epoll.wait_for_activity(&mut events, None)?;
		let keys: Vec<u64> = activity.iter().map(|e| e.data()).collect();

		for key in keys {
			match key {
				SHUTDOWN_KEY => break 'accept,
				LISTENER_KEY => accept_clients(&listener, max_clients, ring_capacity, &epoll, &mut clients)?,
				key => {
					let index = key as usize;
					if !service_client(&mut clients, index, handler.as_mut()) {
						if clients.try_remove(index).is_some() {
							info!("disconnected client #{index}");
						}
					}
				},
			}
		}
	}

	info!("shutting down, disconnecting {} client(s)", clients.len());
	Ok(())
}

fn accept_clients(
	listener: &TcpListener,
	max_clients: usize,
	ring_capacity: usize,
	epoll: &Epoll,
	clients: &mut Slab<Client>,
) -> Result<()> {
	loop {
		match listener.accept() {
			Ok((sock, addr)) => {
				if clients.len() >= max_clients {
					warn!("rejecting connection from {addr}: at capacity ({max_clients} clients)");
					continue;
				}
				sock.set_nonblocking(true)?;
				let engine = ClientEngine::new(ring_capacity);
				let entry = clients.vacant_entry();
				let key = entry.key() as u64;
				epoll.register(&sock, Interest::EPOLLIN, key)?;
				info!("connected client #{key} from {addr}");
				entry.insert(Client { sock, engine });
			},
			Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
			Err(err) => return Err(err),
		}
	}
}

/// Service one ready client. Returns `false` if the client should be disconnected.
fn service_client(clients: &mut Slab<Client>, index: usize, handler: &mut dyn TransactionStream) -> bool {
	let Some(client) = clients.get_mut(index) else { return false };
	match client.engine.read_from(&client.sock) {
		Ok(0) => return false,
		Ok(_) => (),
		Err(err) if err.kind() == ErrorKind::WouldBlock => (),
		Err(err) => {
			warn!("read error on client #{index}: {err}");
			return false;
		},
	}
	if let Err(err) = client.engine.process_input_stream(handler) {
		warn!("protocol error on client #{index}: {err}");
		return false;
	}
	if client.engine.has_output() {
		if let Err(err) = client.engine.write_to(&client.sock) {
			if err.kind() != ErrorKind::WouldBlock {
				warn!("write error on client #{index}: {err}");
				return false;
			}
		}
	}
	true
}
