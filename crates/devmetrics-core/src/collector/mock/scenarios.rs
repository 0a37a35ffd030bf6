//! Pre-built mock filesystem scenarios for testing.
//!
//! Addresses in `net/tcp*` are hex dumps of host-order words, written here
//! for a little-endian host.

use super::filesystem::MockFs;

impl MockFs {
    /// A small gateway-class device: four processes, two IPv4 and one IPv6
    /// established connection, plus listening and closing sockets.
    pub fn typical_device() -> Self {
        let mut fs = Self::new();

        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 5000 250 1500 40000 500 100 50 0 0 0
cpu1 5000 250 1500 40000 500 100 50 0 0 0
btime 1700000000
",
        );
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:         262144 kB
MemFree:           48264 kB
MemAvailable:      96000 kB
",
        );
        fs.add_file(
            "/proc/buddyinfo",
            "\
Node 0, zone      DMA      0      0      0      1      2      1      1      0      1      1      3
Node 0, zone    DMA32      4      3      2      0      0      0      0      0      0      0      0
",
        );
        fs.add_file(
            "/proc/vmstat",
            "\
pgpgin 123456
pgalloc_dma 10
pgalloc_normal 5000
pgalloc_movable 40
pgfree 4800
",
        );

        // 0.0.0.0:22 listening, 192.168.1.10 -> 52.94.236.248:8883 and
        // 192.168.1.20:22 established, one TIME_WAIT to 93.184.216.34:80
        fs.add_file(
            "/proc/net/tcp",
            "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 1001 1 0 100 0 0 10 0
   1: 0A01A8C0:C350 F8EC5E34:22B3 01 00000000:00000000 02:000A7D8A 00000000  1000        0 1002 2 0 20 4 30 10 -1
   2: 0A01A8C0:D431 1401A8C0:0016 01 00000000:00000000 02:0008B2C4 00000000     0        0 1003 3 0 21 4 28 10 -1
   3: 0A01A8C0:E1F2 22D8B85D:0050 06 00000000:00000000 03:00000F3C 00000000     0        0 0 3 0
",
        );
        // [::]:443 listening, [::1] -> [2001:db8::7]:443 established
        fs.add_file(
            "/proc/net/tcp6",
            "\
  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000000000000:01BB 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 2001 1 0 100 0 0 10 0
   1: 00000000000000000000000001000000:9C40 B80D0120000000000000000007000000:01BB 01 00000000:00000000 02:000A7D8A 00000000  1000        0 2002 2 0 20 4 30 10 -1
",
        );

        fs.add_process(
            1,
            "1 (init) S 0 1 1 0 -1 4194560 5000 100000 50 500 300 200 1000 500 20 0 1 0 1 170000000 2000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0",
            "Name:\tinit\nState:\tS (sleeping)\nVmStk:\t     132 kB\n",
        );
        fs.add_process(
            2,
            "2 (kthreadd) S 0 0 0 0 -1 2129984 0 0 0 0 0 10 0 0 20 0 1 0 2 0 0 18446744073709551615 0 0 0 0 0 0 0 2147483647 0 0 0 0 17 1 0 0 0 0 0 0 0 0 0 0 0 0 0",
            "Name:\tkthreadd\nState:\tS (sleeping)\n",
        );
        fs.add_process(
            812,
            "812 (sshd) S 1 812 812 0 -1 4194560 800 0 2 0 40 20 0 0 20 0 1 0 500 15000000 1200 18446744073709551615 0 0 0 0 0 0 0 4096 81925 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0",
            "Name:\tsshd\nState:\tS (sleeping)\nVmStk:\t     136 kB\n",
        );
        fs.add_process(
            1033,
            "1033 (mqtt-agent) R 1 1033 1033 0 -1 4194304 2500 0 5 0 1200 300 0 0 20 0 3 0 900 25000000 3000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0 0 0 0 0 0 0 0 0",
            "Name:\tmqtt-agent\nState:\tR (running)\nVmStk:\t     132 kB\n",
        );

        fs
    }
}
