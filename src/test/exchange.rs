use crate::bench::{ExchangeMode, Sample, bandwidth_gbps, exchange};
use crate::comm::{Communicator, LocalGroup};
use crate::mem::{BufferPair, MemorySpace};
use crate::topo::RingTopology;
use std::time::Duration;

fn pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(17).wrapping_add(seed))
        .collect()
}

#[test]
fn bandwidth_counts_both_directions() {
    let bw = bandwidth_gbps(64_000_000, 0.120738);
    assert!((bw - 1.060).abs() < 1e-3, "bw={bw}");

    let s = Sample::new(500_000_000, Duration::from_secs(1));
    assert_eq!(s.duration_secs, 1.0);
    assert!((s.bandwidth_gbps - 1.0).abs() < 1e-12);
}

#[test]
fn ring_exchange_receives_predecessor_payload() {
    let size = 3;
    let len = 4096;
    let got = LocalGroup::run(size, |comm| {
        let topo = RingTopology::resolve(comm.rank(), comm.size());
        let mut buffers = BufferPair::allocate(MemorySpace::Host, len, 0).expect("alloc");
        buffers
            .send
            .fill_from(&pattern(comm.rank() as u8, len))
            .expect("fill");
        let sample =
            exchange(&comm, &topo, &mut buffers, ExchangeMode::Transfer).expect("exchange");
        (sample, buffers.recv.to_vec().expect("read"), buffers.len())
    });
    for (rank, (sample, recv, len_after)) in got.into_iter().enumerate() {
        let prev = (rank + size - 1) % size;
        assert_eq!(recv, pattern(prev as u8, len), "rank {rank}");
        assert_eq!(len_after, len);
        assert!(sample.duration_secs >= 0.0);
        assert!(sample.bandwidth_gbps > 0.0);
    }
}

#[test]
fn local_copy_reproduces_send_buffer_exactly() {
    let len = 10_007;
    let got = LocalGroup::run(1, |comm| {
        let topo = RingTopology::resolve(comm.rank(), comm.size());
        let mode = ExchangeMode::select(&topo, true);
        assert_eq!(mode, ExchangeMode::LocalCopy);
        let mut buffers = BufferPair::allocate(MemorySpace::Host, len, 0).expect("alloc");
        let send = pattern(0xa5, len);
        buffers.send.fill_from(&send).expect("fill");
        exchange(&comm, &topo, &mut buffers, mode).expect("exchange");
        (send, buffers.recv.to_vec().expect("read"))
    });
    let (send, recv) = &got[0];
    assert_eq!(send, recv);
}

#[test]
fn self_loop_transfer_matches_local_copy() {
    let len = 333;
    let got = LocalGroup::run(1, |comm| {
        let topo = RingTopology::resolve(0, 1);
        let mut buffers = BufferPair::allocate(MemorySpace::Host, len, 0).expect("alloc");
        buffers.send.fill_from(&pattern(3, len)).expect("fill");
        exchange(&comm, &topo, &mut buffers, ExchangeMode::Transfer).expect("exchange");
        buffers.recv.to_vec().expect("read")
    });
    assert_eq!(got[0], pattern(3, len));
}

#[test]
fn local_copy_only_selected_for_single_rank() {
    assert_eq!(
        ExchangeMode::select(&RingTopology::resolve(0, 1), true),
        ExchangeMode::LocalCopy
    );
    assert_eq!(
        ExchangeMode::select(&RingTopology::resolve(0, 1), false),
        ExchangeMode::Transfer
    );
    assert_eq!(
        ExchangeMode::select(&RingTopology::resolve(1, 2), true),
        ExchangeMode::Transfer
    );
}
