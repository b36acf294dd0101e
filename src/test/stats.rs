use crate::bench::{LocalStats, Sample, Summary, aggregate, format_text};
use crate::comm::{Communicator, LocalGroup, ROOT};

fn sample(duration_secs: f64, bandwidth_gbps: f64) -> Sample {
    Sample {
        duration_secs,
        bandwidth_gbps,
    }
}

#[test]
fn aggregate_reduces_min_max_mean_at_root() {
    let durations = [0.004172, 0.004173, 0.004173];
    let bandwidths = [0.503, 0.502, 0.501];
    let got = LocalGroup::run(3, |comm| {
        let r = comm.rank();
        let local = LocalStats::from(sample(durations[r], bandwidths[r]));
        aggregate(&comm, &local, ROOT).expect("aggregate")
    });

    let root = got[0].expect("root has stats");
    assert!(got[1].is_none());
    assert!(got[2].is_none());

    assert_eq!(root.duration_secs.min, 0.004172);
    assert_eq!(root.duration_secs.max, 0.004173);
    let expected_avg = (0.004172 + 0.004173 + 0.004173) / 3.0;
    assert!((root.duration_secs.avg - expected_avg).abs() < 1e-15);
    assert!((root.duration_secs.avg - 0.0041727).abs() < 1e-7);

    assert_eq!(root.bandwidth_gbps.min, 0.501);
    assert_eq!(root.bandwidth_gbps.max, 0.503);
    assert!((root.bandwidth_gbps.avg - 0.502).abs() < 1e-12);
}

#[test]
fn mean_is_total_sum_over_total_count() {
    // Rank 1 contributes three samples: the mean must weight them all equally
    // rather than averaging per-rank averages ((1 + 3) / 2 = 2).
    let got = LocalGroup::run(2, |comm| {
        let local = if comm.rank() == 0 {
            LocalStats::from_samples(&[sample(1.0, 1.0)])
        } else {
            LocalStats::from_samples(&[sample(2.0, 2.0), sample(3.0, 3.0), sample(4.0, 4.0)])
        };
        aggregate(&comm, &local, ROOT).expect("aggregate")
    });
    let root = got[0].expect("root has stats");
    assert_eq!(root.duration_secs.avg, 2.5);
    assert_eq!(root.bandwidth_gbps.avg, 2.5);
    assert_eq!(root.duration_secs.min, 1.0);
    assert_eq!(root.duration_secs.max, 4.0);
}

#[test]
fn identical_samples_give_identical_lines() {
    let durations = [0.120738, 0.120001, 0.119877, 0.121500];
    let run_once = || {
        LocalGroup::run(4, |comm| {
            let d = durations[comm.rank()];
            let s = sample(d, crate::bench::bandwidth_gbps(64_000_000, d));
            aggregate(&comm, &LocalStats::from(s), ROOT).expect("aggregate")
        })
    };
    let first = run_once()[0].expect("root stats");
    let second = run_once()[0].expect("root stats");
    assert_eq!(format_text(&first), format_text(&second));
}

#[test]
fn summary_merge_is_order_independent() {
    let a = Summary::of(3.0);
    let b = Summary::from_values(&[1.0, 5.0]);
    let c = Summary::of(2.0);

    assert_eq!(a.merge(&b), b.merge(&a));
    assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));

    let all = a.merge(&b).merge(&c);
    assert_eq!((all.min, all.max, all.sum, all.count), (1.0, 5.0, 11.0, 4));
    let agg = all.finish().expect("non-empty");
    assert_eq!(agg.avg, 2.75);
}

#[test]
fn empty_summary_has_no_aggregate() {
    assert!(Summary::EMPTY.finish().is_none());
    assert_eq!(Summary::EMPTY.merge(&Summary::of(1.5)), Summary::of(1.5));
}
