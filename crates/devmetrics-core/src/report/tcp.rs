//! `tcp_connections` schema.
//!
//! ```text
//! tcp_connections: {
//!   established_connections: {        iff ESTABLISHED
//!     connections: [                  iff CONNECTIONS and total > 0
//!       { remote_addr: "a.b.c.d:p" }  remote_addr iff REMOTE_ADDR
//!     ],
//!     total: n                        iff TOTAL
//!   }
//! }
//! ```

use super::error::ReportError;
use super::schema::GroupSchema;
use super::tags::Tags;
use crate::collector::{ConnectionRecord, StatsSource};
use crate::encoder::{EncodeError, Scalar, StructuredEncoder};
use crate::metrics::{MetricsGroup, tcp};

/// Schema encoder of [`MetricsGroup::TcpConnections`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnectionsSchema;

impl GroupSchema for TcpConnectionsSchema {
    fn group(&self) -> MetricsGroup {
        MetricsGroup::TcpConnections
    }

    fn encode(
        &self,
        mask: u32,
        tags: &Tags,
        source: &mut dyn StatsSource,
        enc: &mut dyn StructuredEncoder,
    ) -> Result<(), ReportError> {
        let mut outcome = Ok(());
        source.visit_tcp_connections(&mut |connections: &[ConnectionRecord]| {
            outcome = encode_tcp_connections(mask, connections, tags, enc);
        })?;
        Ok(outcome?)
    }
}

fn encode_tcp_connections(
    mask: u32,
    connections: &[ConnectionRecord],
    tags: &Tags,
    enc: &mut dyn StructuredEncoder,
) -> Result<(), EncodeError> {
    let total = connections.len();
    let has_established = mask & tcp::ESTABLISHED != 0;
    // An empty array is never emitted.
    let has_connections = mask & tcp::CONNECTIONS != 0 && total > 0;
    let has_total = mask & tcp::TOTAL != 0;
    let has_remote_addr = mask & tcp::REMOTE_ADDR != 0;

    enc.open_map(Some(tags.tcp_connections), has_established as usize)?;

    if has_established {
        enc.open_map(
            Some(tags.established_connections),
            has_connections as usize + has_total as usize,
        )?;

        if has_connections {
            enc.open_array(Some(tags.connections), total)?;
            for connection in connections {
                enc.open_map(None, has_remote_addr as usize)?;
                if has_remote_addr {
                    enc.append(
                        Some(tags.remote_addr),
                        Scalar::Text(&connection.remote_addr),
                    )?;
                }
                enc.close()?;
            }
            enc.close()?;
        }

        if has_total {
            enc.append(Some(tags.total), Scalar::uint(total as u64))?;
        }

        enc.close()?;
    }

    enc.close()
}
