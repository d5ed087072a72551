use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::error::BindError;

/// Listen queue length used when none is configured.
pub const DEFAULT_BACKLOG: u32 = 10;

const SERVICES_DB: &str = "/etc/services";

/// Creates the listening socket for `service`: a numeric port, a service
/// name from `/etc/services`, or an explicit `host:port`.
pub async fn bind(service: &str, backlog: u32) -> Result<TcpListener, BindError> {
    let candidates = resolve(service).await?;
    bind_candidates(service, &candidates, backlog)
}

/// Tries each address in order and returns the first one that binds.
pub fn bind_candidates(
    service: &str,
    candidates: &[SocketAddr],
    backlog: u32,
) -> Result<TcpListener, BindError> {
    let mut last = None;

    for &addr in candidates {
        let socket = match Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP)) {
            Ok(socket) => socket,
            Err(e) => {
                debug!(%addr, error = %e, "socket creation failed, trying next candidate");
                last = Some(e);
                continue;
            }
        };

        socket
            .set_reuse_address(true)
            .map_err(|source| BindError::SocketOption { addr, source })?;

        if let Err(e) = socket.bind(&addr.into()) {
            debug!(%addr, error = %e, "bind failed, trying next candidate");
            last = Some(e);
            continue;
        }

        match into_listener(socket, backlog) {
            Ok(listener) => {
                info!(%addr, backlog, "listening");
                return Ok(listener);
            }
            Err(e) => {
                debug!(%addr, error = %e, "listen failed, trying next candidate");
                last = Some(e);
            }
        }
    }

    Err(BindError::Exhausted {
        service: service.to_string(),
        last,
    })
}

fn into_listener(socket: Socket, backlog: u32) -> io::Result<TcpListener> {
    socket.listen(backlog as i32)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

/// Expands `service` into candidate addresses. A bare port yields the
/// passive wildcard addresses, IPv6 first.
pub async fn resolve(service: &str) -> Result<Vec<SocketAddr>, BindError> {
    if let Some(port) = lookup_port(service) {
        return Ok(vec![
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)),
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
        ]);
    }

    if !service.contains(':') {
        return Err(BindError::UnknownService(service.to_string()));
    }

    let addrs = tokio::net::lookup_host(service)
        .await
        .map_err(|source| BindError::Resolve {
            service: service.to_string(),
            source,
        })?;

    Ok(addrs.collect())
}

fn lookup_port(service: &str) -> Option<u16> {
    if let Ok(port) = service.parse::<u16>() {
        return Some(port);
    }

    let db = std::fs::read_to_string(SERVICES_DB).ok()?;
    find_service(&db, service)
}

/// Finds the tcp port of `name` in services(5) formatted text. Aliases
/// after the port column match too.
pub fn find_service(db: &str, name: &str) -> Option<u16> {
    db.lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            let primary = fields.next()?;
            let (port, proto) = fields.next()?.split_once('/')?;

            if proto != "tcp" {
                return None;
            }
            if primary != name && !fields.any(|alias| alias == name) {
                return None;
            }
            port.parse().ok()
        })
}
