//! Minimal mDNS responder.
//!
//! Answers A (and ANY) questions for `<hostname>.local` with the configured
//! IPv4 address so phones joined to the device's access point can open the
//! app by name. Everything else on the multicast group is ignored.

use crate::error::{DiagnosticsError, Result};
use crate::metrics::METRICS;
use dns_parser::{Packet, QueryClass, QueryType};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const MDNS_PORT: u16 = 5353;
pub const MDNS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const DEFAULT_TTL: u32 = 120;
/// Upper bound for TTLs in legacy unicast replies.
pub const LEGACY_TTL: u32 = 10;

const DNS_HDR_LEN: usize = 12;
const MAX_PACKET: usize = 9000;
const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;
const CACHE_FLUSH: u16 = 0x8000;
/// QR (response) + AA (authoritative).
const RESPONSE_FLAGS: u16 = 0x8400;
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone)]
pub struct MdnsResponder {
    /// Lowercased fully qualified name, without trailing dot.
    name: String,
    address: Ipv4Addr,
    ttl: u32,
}

/// Where a reply should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub packet: Vec<u8>,
    pub unicast: bool,
}

impl MdnsResponder {
    pub fn new(hostname: &str, address: Ipv4Addr) -> Self {
        let name = format!("{}.local", hostname.trim_end_matches('.')).to_ascii_lowercase();
        Self {
            name,
            address,
            ttl: DEFAULT_TTL,
        }
    }

    /// Build the reply for one inbound packet, if it asks about us.
    ///
    /// `legacy` marks a query that did not come from port 5353. Those get a
    /// unicast reply that echoes the query id and question, with a short TTL
    /// and no cache-flush bit (RFC 6762 6.7).
    pub fn handle_packet(&self, data: &[u8], legacy: bool) -> Result<Option<Reply>> {
        let packet = Packet::parse(data)?;
        if !packet.header.query {
            return Ok(None);
        }

        let mut matched = None;
        let mut unicast = legacy;
        for question in &packet.questions {
            let type_matches = matches!(question.qtype, QueryType::A | QueryType::All);
            let class_matches = matches!(question.qclass, QueryClass::IN | QueryClass::Any);
            let name = question.qname.to_string();
            if type_matches && class_matches && name.eq_ignore_ascii_case(&self.name) {
                unicast |= question.prefer_unicast;
                matched.get_or_insert(MatchedQuestion {
                    name,
                    qtype: question.qtype as u16,
                    qclass: question.qclass as u16,
                });
            }
        }

        let Some(question) = matched else {
            return Ok(None);
        };

        let packet = if legacy {
            self.encode_legacy_answer(packet.header.id, &question)?
        } else {
            self.encode_answer()?
        };
        Ok(Some(Reply { packet, unicast }))
    }

    fn encode_answer(&self) -> Result<Vec<u8>> {
        let mut buffer = header(0, 0);
        self.push_record(&mut buffer, self.ttl, CLASS_IN | CACHE_FLUSH)?;
        Ok(buffer)
    }

    fn encode_legacy_answer(&self, id: u16, question: &MatchedQuestion) -> Result<Vec<u8>> {
        let mut buffer = header(id, 1);
        buffer.extend_from_slice(&encode_name(&question.name)?);
        buffer.extend_from_slice(&question.qtype.to_be_bytes());
        buffer.extend_from_slice(&question.qclass.to_be_bytes());
        self.push_record(&mut buffer, self.ttl.min(LEGACY_TTL), CLASS_IN)?;
        Ok(buffer)
    }

    fn push_record(&self, buffer: &mut Vec<u8>, ttl: u32, class: u16) -> Result<()> {
        buffer.extend_from_slice(&encode_name(&self.name)?);
        buffer.extend_from_slice(&TYPE_A.to_be_bytes());
        buffer.extend_from_slice(&class.to_be_bytes());
        buffer.extend_from_slice(&ttl.to_be_bytes());
        buffer.extend_from_slice(&4u16.to_be_bytes());
        buffer.extend_from_slice(&self.address.octets());
        Ok(())
    }

    /// Bind the responder socket, joining the mDNS group on the standard port.
    pub async fn bind(addr: SocketAddr) -> Result<UdpSocket> {
        let socket = UdpSocket::bind(addr).await?;
        if addr.port() == MDNS_PORT {
            let interface = match addr {
                SocketAddr::V4(v4) => *v4.ip(),
                SocketAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
            };
            socket.join_multicast_v4(MDNS_GROUP, interface)?;
            socket.set_multicast_loop_v4(true)?;
        }
        Ok(socket)
    }

    pub async fn run(self, socket: UdpSocket, shutdown: CancellationToken) -> Result<()> {
        let local = socket.local_addr()?;
        info!(name = %self.name, address = %self.address, bind = %local, "mDNS responder started");
        let mut buf = vec![0u8; MAX_PACKET];

        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = socket.recv_from(&mut buf) => received,
            };
            let (len, src) = match received {
                Ok(received) => received,
                Err(e) if is_transient(&e) => {
                    METRICS.record_mdns("recv_error");
                    warn!("mDNS receive failed, continuing: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let legacy = src.port() != MDNS_PORT;
            match self.handle_packet(&buf[..len], legacy) {
                Ok(Some(reply)) => {
                    let dest = if reply.unicast || local.port() != MDNS_PORT {
                        src
                    } else {
                        SocketAddr::V4(SocketAddrV4::new(MDNS_GROUP, MDNS_PORT))
                    };
                    METRICS.record_mdns("answered");
                    debug!(%src, %dest, "answering mDNS query");
                    if let Err(e) = socket.send_to(&reply.packet, dest).await {
                        warn!(%dest, "failed to send mDNS reply: {}", e);
                    }
                }
                Ok(None) => METRICS.record_mdns("ignored"),
                Err(e) => {
                    METRICS.record_mdns("malformed");
                    debug!(%src, "dropping packet: {}", e);
                }
            }
        }

        info!("mDNS responder stopped");
        Ok(())
    }
}

/// Errors a UDP socket reports for a single datagram, typically an ICMP
/// unreachable from an earlier send. The socket itself is still usable.
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// First question that asked about us; echoed in legacy replies.
#[derive(Debug)]
struct MatchedQuestion {
    name: String,
    qtype: u16,
    qclass: u16,
}

/// Response header with one answer.
fn header(id: u16, questions: u16) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(DNS_HDR_LEN + 64);
    buffer.extend_from_slice(&id.to_be_bytes());
    buffer.extend_from_slice(&RESPONSE_FLAGS.to_be_bytes());
    buffer.extend_from_slice(&questions.to_be_bytes());
    buffer.extend_from_slice(&1u16.to_be_bytes()); // answers
    buffer.extend_from_slice(&0u16.to_be_bytes()); // authority
    buffer.extend_from_slice(&0u16.to_be_bytes()); // additional
    buffer
}

fn encode_name(name: &str) -> Result<Vec<u8>> {
    let mut encoded = Vec::with_capacity(name.len() + 2);
    for label in name.split('.') {
        if label.is_empty() {
            continue;
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(DiagnosticsError::MdnsName(name.to_string()));
        }
        encoded.push(label.len() as u8);
        encoded.extend_from_slice(label.as_bytes());
    }
    encoded.push(0);
    Ok(encoded)
}
