mod integration {
    mod summary {
        use parbench::util::Xorshift;
        use parbench::{Ckms, Error, Exact, Summary, Targets};
        use quickcheck::{QuickCheck, TestResult};
        use std::time::Duration;

        // rank of v among sorted: how many values are <= v, and how many < v
        fn rank_bounds(sorted: &[u64], v: u64) -> (usize, usize) {
            let below = sorted.partition_point(|&x| x < v);
            let through = sorted.partition_point(|&x| x <= v);
            (below + 1, through)
        }

        // true when some rank v could hold lies within slack of phi * n
        fn within(sorted: &[u64], v: u64, phi: f64, slack: f64) -> bool {
            let t = phi * sorted.len() as f64;
            let (lo, hi) = rank_bounds(sorted, v);
            lo as f64 <= t + slack && hi as f64 >= t - slack
        }

        fn shuffled(n: u64, seed: u64) -> Vec<u64> {
            let mut values: Vec<u64> = (1..=n).collect();
            Xorshift::new(seed).shuffle(&mut values);
            values
        }

        macro_rules! summary_contract {
            ($name:ident, $summary:ident, $eps:expr) => {
                mod $name {
                    use super::*;

                    type S = $summary<u64>;

                    fn summary(targets: &[(f64, f64)]) -> S {
                        S::with_targets(Targets::new(targets.iter().cloned()).unwrap())
                    }

                    #[test]
                    fn median_of_shuffled_hundred() {
                        let mut s = summary(&[(0.5, 0.01)]);
                        for v in shuffled(100, 17) {
                            s.insert(v).unwrap();
                        }
                        let median = s.query(0.5).unwrap();
                        assert!(median >= 45 && median <= 55, "median {}", median);
                    }

                    #[test]
                    fn median_of_ten_contiguous_shards() {
                        let values = shuffled(100, 23);
                        let mut shards: Vec<S> = Vec::new();
                        for chunk in values.chunks(10) {
                            let mut shard = summary(&[(0.5, 0.01)]);
                            for v in chunk {
                                shard.insert(*v).unwrap();
                            }
                            shards.push(shard);
                        }
                        let merged = shards.into_iter().fold(summary(&[(0.5, 0.01)]), |acc, s| acc.merge(s));
                        assert_eq!(merged.count(), 100);
                        let median = merged.query(0.5).unwrap();
                        assert!(median >= 45 && median <= 55, "median {}", median);
                    }

                    #[test]
                    fn empty_query_is_empty_error() {
                        let s = summary(&[(0.5, 0.01)]);
                        assert_eq!(s.query(0.5), Err(Error::Empty));
                        assert_eq!(s.count(), 0);
                    }

                    #[test]
                    fn out_of_range_target_is_config_error() {
                        assert!(matches!(Targets::new(vec![(1.5, 0.01)]), Err(Error::Config(_))));
                        assert!(matches!(S::new(vec![(0.5, 0.0)]), Err(Error::Config(_))));
                    }

                    #[test]
                    fn undeclared_quantile_is_rejected() {
                        let mut s = summary(&[(0.5, 0.01)]);
                        s.insert(1).unwrap();
                        assert_eq!(s.query(0.75), Err(Error::Query { phi: 0.75 }));
                    }

                    #[test]
                    fn extremes_are_exact() {
                        fn inner(data: Vec<u64>) -> TestResult {
                            if data.is_empty() {
                                return TestResult::discard();
                            }
                            let mut s = summary(&[(0.0, 0.05), (0.5, 0.05), (1.0, 0.05)]);
                            for v in &data {
                                s.insert(*v).unwrap();
                            }
                            let min = *data.iter().min().unwrap();
                            let max = *data.iter().max().unwrap();
                            TestResult::from_bool(s.query(0.0) == Ok(min) && s.query(1.0) == Ok(max))
                        }
                        QuickCheck::new().quickcheck(inner as fn(Vec<u64>) -> TestResult);
                    }

                    #[test]
                    fn rank_error_is_bounded() {
                        fn inner(data: Vec<u64>) -> TestResult {
                            if data.is_empty() {
                                return TestResult::discard();
                            }
                            let targets = [(0.1, 0.02), (0.5, 0.02), (0.9, 0.01), (0.99, 0.001)];
                            let mut s = summary(&targets);
                            for v in &data {
                                s.insert(*v).unwrap();
                            }
                            let mut sorted = data.clone();
                            sorted.sort_unstable();
                            let n = sorted.len() as f64;
                            for &(phi, eps) in &targets {
                                let v = s.query(phi).unwrap();
                                if !within(&sorted, v, phi, $eps * eps * n + 1.0) {
                                    return TestResult::failed();
                                }
                            }
                            TestResult::passed()
                        }
                        QuickCheck::new().quickcheck(inner as fn(Vec<u64>) -> TestResult);
                    }

                    #[test]
                    fn count_survives_any_partition() {
                        fn inner(data: Vec<u64>, cuts: Vec<u8>) -> bool {
                            let mut shards: Vec<S> = Vec::new();
                            let mut rest = &data[..];
                            for cut in cuts {
                                let at = usize::from(cut).min(rest.len());
                                let (head, tail) = rest.split_at(at);
                                let mut shard = summary(&[(0.5, 0.01)]);
                                for v in head {
                                    shard.insert(*v).unwrap();
                                }
                                shards.push(shard);
                                rest = tail;
                            }
                            let mut last = summary(&[(0.5, 0.01)]);
                            for v in rest {
                                last.insert(*v).unwrap();
                            }
                            let merged = shards.into_iter().fold(last, |acc, s| s.merge(acc));
                            merged.count() == data.len()
                        }
                        QuickCheck::new().quickcheck(inner as fn(Vec<u64>, Vec<u8>) -> bool);
                    }

                    #[test]
                    fn merge_grouping_stays_within_error() {
                        let targets = [(0.5, 0.01), (0.9, 0.01), (0.99, 0.005)];
                        let mut rng = Xorshift::new(99);
                        let data: Vec<u64> = (0..20_000).map(|_| rng.next_below(1_000_000)).collect();
                        let mut sorted = data.clone();
                        sorted.sort_unstable();

                        // round-robin so every shard sees the same distribution
                        let mut shards: Vec<S> = (0..4).map(|_| summary(&targets)).collect();
                        for (i, v) in data.iter().enumerate() {
                            shards[i % 4].insert(*v).unwrap();
                        }
                        let mut it = shards.into_iter();
                        let (a, b, c, d) = (
                            it.next().unwrap(),
                            it.next().unwrap(),
                            it.next().unwrap(),
                            it.next().unwrap(),
                        );
                        let left = a.clone().merge(b.clone()).merge(c.clone()).merge(d.clone());
                        let right = a.merge(b.merge(c.merge(d)));

                        let n = data.len() as f64;
                        for &(phi, eps) in &targets {
                            let l = left.query(phi).unwrap();
                            let r = right.query(phi).unwrap();
                            assert!(within(&sorted, l, phi, $eps * eps * n + 2.0), "phi {} left {}", phi, l);
                            assert!(within(&sorted, r, phi, $eps * eps * n + 2.0), "phi {} right {}", phi, r);
                        }
                    }

                    #[test]
                    fn durations_are_samples() {
                        let mut s = $summary::<Duration>::new(vec![(0.5, 0.01), (1.0, 0.01)]).unwrap();
                        for ms in 1..=10 {
                            s.insert(Duration::from_millis(ms)).unwrap();
                        }
                        assert_eq!(s.query(1.0), Ok(Duration::from_millis(10)));
                        assert_eq!(s.query(0.5), Ok(Duration::from_millis(5)));
                    }
                }
            };
        }

        summary_contract!(ckms, Ckms, 1.0);
        summary_contract!(exact, Exact, 0.0);
    }
}
