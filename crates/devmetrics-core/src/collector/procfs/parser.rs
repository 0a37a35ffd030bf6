//! Pure parsers for the `/proc` files the procfs source reads: per-process
//! `stat`/`status`, the aggregate `stat` line, `meminfo`, `buddyinfo`,
//! `vmstat` and the `net/tcp*` socket tables.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Fields of `/proc/[pid]/stat` the task sampler needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcStat {
    pub pid: u32,
    pub comm: String,
    pub state: char,
    pub utime: u64,
    pub stime: u64,
    pub priority: i32,
}

/// Parses `/proc/[pid]/stat` content.
///
/// The comm field can contain spaces and parentheses, so it is delimited by
/// the first `(` and the last `)`.
pub fn parse_proc_stat(content: &str) -> Result<ProcStat, ParseError> {
    let content = content.trim();

    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let pid: u32 = content[..open_paren]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid"))?;

    let comm = content[open_paren + 1..close_paren].to_string();

    let fields: Vec<&str> = content[close_paren + 1..].split_whitespace().collect();
    if fields.len() < 16 {
        return Err(ParseError::new(format!(
            "not enough fields in stat: expected 16+, got {}",
            fields.len()
        )));
    }

    let parse_u64 = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(ProcStat {
        pid,
        comm,
        state: fields[0].chars().next().unwrap_or('?'),
        utime: parse_u64(11, "utime")?,
        stime: parse_u64(12, "stime")?,
        priority: fields[15]
            .parse()
            .map_err(|_| ParseError::new("invalid priority"))?,
    })
}

/// Extracts `VmStk` (kB) from `/proc/[pid]/status`. Kernel threads have none.
pub fn parse_status_stack_kb(content: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("VmStk:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|v| v.parse().ok())
}

/// Aggregate CPU time from the `cpu` line of `/proc/stat`, in jiffies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTotals {
    /// user + nice + system + idle + iowait + irq + softirq + steal.
    pub total: u64,
    /// idle + iowait.
    pub idle: u64,
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
///
/// Guest time is already accounted in user/nice and is not added again.
pub fn parse_cpu_totals(content: &str) -> Result<CpuTotals, ParseError> {
    let line = content
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| ParseError::new("missing aggregate cpu line"))?;

    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|v| v.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|_| ParseError::new("invalid cpu counter"))?;

    if values.len() < 4 {
        return Err(ParseError::new(format!(
            "not enough cpu counters: expected 4+, got {}",
            values.len()
        )));
    }

    Ok(CpuTotals {
        total: values.iter().sum(),
        idle: values[3] + values.get(4).copied().unwrap_or(0),
    })
}

/// Extracts `MemFree` (kB) from `/proc/meminfo`.
pub fn parse_meminfo_free_kb(content: &str) -> Result<u64, ParseError> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("MemFree:"))
        .and_then(|rest| rest.split_whitespace().next())
        .ok_or_else(|| ParseError::new("missing MemFree in meminfo"))?
        .parse()
        .map_err(|_| ParseError::new("invalid MemFree"))
}

/// Free-block summary over all zones of `/proc/buddyinfo`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuddySummary {
    /// Highest order with at least one free block.
    pub largest_order: Option<u32>,
    /// Lowest order with at least one free block.
    pub smallest_order: Option<u32>,
    pub free_blocks: u64,
}

/// Parses `/proc/buddyinfo`.
///
/// Format: `Node 0, zone   Normal   4   3   2 ...` with one count per order.
pub fn parse_buddyinfo(content: &str) -> Result<BuddySummary, ParseError> {
    let mut summary = BuddySummary::default();

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let counts = line
            .split_once("zone")
            .map(|(_, rest)| rest)
            .ok_or_else(|| ParseError::new("missing zone in buddyinfo"))?;

        // First token after "zone" is the zone name.
        for (order, count) in counts.split_whitespace().skip(1).enumerate() {
            let count: u64 = count
                .parse()
                .map_err(|_| ParseError::new("invalid buddyinfo count"))?;
            if count == 0 {
                continue;
            }
            let order = order as u32;
            summary.free_blocks += count;
            summary.largest_order = Some(summary.largest_order.map_or(order, |o| o.max(order)));
            summary.smallest_order = Some(summary.smallest_order.map_or(order, |o| o.min(order)));
        }
    }

    Ok(summary)
}

/// Page allocator activity from `/proc/vmstat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocCounters {
    /// Sum of every `pgalloc_*` counter.
    pub allocations: u64,
    pub frees: u64,
}

pub fn parse_vmstat_alloc(content: &str) -> Result<AllocCounters, ParseError> {
    let mut counters = AllocCounters::default();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let parse = || {
            value
                .parse::<u64>()
                .map_err(|_| ParseError::new(format!("invalid {}", name)))
        };
        if name.starts_with("pgalloc_") {
            counters.allocations += parse()?;
        } else if name == "pgfree" {
            counters.frees = parse()?;
        }
    }

    Ok(counters)
}

/// Kernel socket state code for an established TCP connection.
pub const TCP_ESTABLISHED: u8 = 0x01;

/// One socket line of `/proc/net/tcp` or `/proc/net/tcp6`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetTcpEntry {
    pub local: SocketAddr,
    pub remote: SocketAddr,
    pub state: u8,
}

/// Parses `/proc/net/tcp` (or `tcp6`) content, skipping the header line.
pub fn parse_net_tcp(content: &str) -> Result<Vec<NetTcpEntry>, ParseError> {
    let mut entries = Vec::new();

    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 4 {
            return Err(ParseError::new(format!(
                "not enough fields in tcp line: expected 4+, got {}",
                fields.len()
            )));
        }
        entries.push(NetTcpEntry {
            local: parse_socket_addr(fields[1])?,
            remote: parse_socket_addr(fields[2])?,
            state: u8::from_str_radix(fields[3], 16)
                .map_err(|_| ParseError::new("invalid socket state"))?,
        });
    }

    Ok(entries)
}

/// Parses `ADDR:PORT` where ADDR is the kernel's hex dump of the address as
/// native-endian 32-bit words and PORT is plain hex.
fn parse_socket_addr(field: &str) -> Result<SocketAddr, ParseError> {
    let (addr, port) = field
        .split_once(':')
        .ok_or_else(|| ParseError::new(format!("invalid socket address '{}'", field)))?;
    let port =
        u16::from_str_radix(port, 16).map_err(|_| ParseError::new("invalid socket port"))?;

    let mut octets = [0u8; 16];
    let words = addr.len() / 8;
    if !(words == 1 || words == 4) || addr.len() % 8 != 0 {
        return Err(ParseError::new(format!(
            "invalid socket address length {}",
            addr.len()
        )));
    }
    for i in 0..words {
        let word = u32::from_str_radix(&addr[i * 8..i * 8 + 8], 16)
            .map_err(|_| ParseError::new("invalid socket address digits"))?;
        octets[i * 4..i * 4 + 4].copy_from_slice(&word.to_ne_bytes());
    }

    let ip = if words == 1 {
        IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
    } else {
        IpAddr::V6(Ipv6Addr::from(octets))
    };
    Ok(SocketAddr::new(ip, port))
}
