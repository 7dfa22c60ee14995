use super::{
    header_len, write_header, CodecOptions, Command, END_OF_STREAM, LONG_MAX_LEN,
    MAX_ABSOLUTE_SOURCE, MAX_RELATIVE_DISTANCE, SHORT_MAX_LEN,
};

const FAST_CHAIN_DEPTH: usize = 32;
const OPTIMAL_CHAIN_DEPTH: usize = 256;
const NIL: u32 = u32::MAX;

/// One encodable step of the output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Op {
    Literal { len: usize },
    Fill { len: usize },
    Word { len: usize },
    Increasing { len: usize },
    Repeat { len: usize, src: usize },
    Inverted { len: usize, src: usize },
    Relative { len: usize, dist: usize },
}

impl Op {
    fn len(self) -> usize {
        match self {
            Op::Literal { len }
            | Op::Fill { len }
            | Op::Word { len }
            | Op::Increasing { len }
            | Op::Repeat { len, .. }
            | Op::Inverted { len, .. }
            | Op::Relative { len, .. } => len,
        }
    }

    fn command(self) -> Command {
        match self {
            Op::Literal { .. } => Command::Copy,
            Op::Fill { .. } => Command::ByteFill,
            Op::Word { .. } => Command::WordFill,
            Op::Increasing { .. } => Command::IncreasingFill,
            Op::Repeat { .. } => Command::Repeat,
            Op::Inverted { .. } => Command::RepeatInverted,
            Op::Relative { .. } => Command::RepeatRelative,
        }
    }

    /// Encoded size in bytes.
    fn cost(self) -> usize {
        let len = self.len();
        header_len(len) + self.command().operand_len(len)
    }

    fn with_len(self, len: usize) -> Op {
        match self {
            Op::Literal { .. } => Op::Literal { len },
            Op::Fill { .. } => Op::Fill { len },
            Op::Word { .. } => Op::Word { len },
            Op::Increasing { .. } => Op::Increasing { len },
            Op::Repeat { src, .. } => Op::Repeat { len, src },
            Op::Inverted { src, .. } => Op::Inverted { len, src },
            Op::Relative { dist, .. } => Op::Relative { len, dist },
        }
    }
}

/// Longest command of each kind available at one input position.
/// Any shorter length of the same command is valid as well.
#[derive(Default, Clone)]
struct Candidates {
    ops: Vec<Op>,
}

/// Compresses `data` into the game's format, including the terminator.
pub fn compress(data: &[u8], options: CodecOptions) -> Vec<u8> {
    let candidates = find_candidates(data, options);
    let ops = if options.optimal {
        parse_optimal(data.len(), &candidates)
    } else {
        parse_greedy(data.len(), &candidates)
    };

    let mut out = Vec::with_capacity(data.len() / 2 + 1);
    let mut pos = 0;
    for op in ops {
        emit(&mut out, data, pos, op);
        pos += op.len();
    }
    debug_assert_eq!(pos, data.len());
    out.push(END_OF_STREAM);
    out
}

fn emit(out: &mut Vec<u8>, data: &[u8], pos: usize, op: Op) {
    let len = op.len();
    write_header(out, op.command(), len);
    match op {
        Op::Literal { .. } => out.extend_from_slice(&data[pos..pos + len]),
        Op::Fill { .. } | Op::Increasing { .. } => out.push(data[pos]),
        Op::Word { .. } => {
            out.push(data[pos]);
            // A one-byte word fill still carries both operand bytes.
            out.push(data.get(pos + 1).copied().unwrap_or(0));
        }
        Op::Repeat { src, .. } | Op::Inverted { src, .. } => {
            out.extend_from_slice(&(src as u16).to_le_bytes());
        }
        Op::Relative { dist, .. } => out.push(dist as u8),
    }
}

/// Length of each run type starting at every position, capped at
/// `LONG_MAX_LEN`.
fn run_lengths(data: &[u8]) -> (Vec<u16>, Vec<u16>, Vec<u16>) {
    let n = data.len();
    let mut fill = vec![0u16; n];
    let mut word = vec![0u16; n];
    let mut inc = vec![0u16; n];
    let cap = LONG_MAX_LEN as u16;

    for i in (0..n).rev() {
        fill[i] = if i + 1 < n && data[i + 1] == data[i] {
            (fill[i + 1] + 1).min(cap)
        } else {
            1
        };
        inc[i] = if i + 1 < n && data[i + 1] == data[i].wrapping_add(1) {
            (inc[i + 1] + 1).min(cap)
        } else {
            1
        };
        word[i] = if i + 2 < n && data[i + 2] == data[i] {
            (word[i + 1].max(2) + 1).min(cap)
        } else {
            (n - i).min(2) as u16
        };
    }

    (fill, word, inc)
}

fn match_len(data: &[u8], src: usize, pos: usize, cap: usize, mask: u8) -> usize {
    let mut len = 0;
    while len < cap && data[src + len] ^ mask == data[pos + len] {
        len += 1;
    }
    len
}

fn key(a: u8, b: u8) -> usize {
    ((a as usize) << 8) | b as usize
}

fn find_candidates(data: &[u8], options: CodecOptions) -> Vec<Candidates> {
    let n = data.len();
    let depth = if options.optimal {
        OPTIMAL_CHAIN_DEPTH
    } else {
        FAST_CHAIN_DEPTH
    };
    let relative_cap = if options.quirks_mode {
        SHORT_MAX_LEN
    } else {
        LONG_MAX_LEN
    };

    let (fill, word, inc) = run_lengths(data);
    let mut head = vec![NIL; 1 << 16];
    let mut prev = vec![NIL; n];
    let mut all = Vec::with_capacity(n);

    for i in 0..n {
        let mut ops = vec![
            Op::Fill { len: fill[i] as usize },
            Op::Word { len: word[i] as usize },
            Op::Increasing { len: inc[i] as usize },
        ];

        if i + 1 < n {
            let cap = LONG_MAX_LEN.min(n - i);

            // Plain matches; the chain runs from the most recent position,
            // so relative candidates are seen first.
            let mut best_abs = (0usize, 0usize);
            let mut best_rel = (0usize, 0usize);
            let mut p = head[key(data[i], data[i + 1])];
            let mut steps = 0;
            while p != NIL && steps < depth {
                let src = p as usize;
                let dist = i - src;
                let in_window = dist <= MAX_RELATIVE_DISTANCE;
                let addressable = src <= MAX_ABSOLUTE_SOURCE;
                if !in_window && !addressable {
                    p = prev[src];
                    steps += 1;
                    continue;
                }
                let len = match_len(data, src, i, cap, 0);
                if addressable && len > best_abs.0 {
                    best_abs = (len, src);
                }
                if in_window && len.min(relative_cap) > best_rel.0 {
                    best_rel = (len.min(relative_cap), dist);
                }
                let rel_done = !in_window || best_rel.0 == cap.min(relative_cap);
                if best_abs.0 == cap && rel_done {
                    break;
                }
                p = prev[src];
                steps += 1;
            }
            if best_abs.0 > 0 {
                ops.push(Op::Repeat { len: best_abs.0, src: best_abs.1 });
            }
            if best_rel.0 > 0 {
                ops.push(Op::Relative { len: best_rel.0, dist: best_rel.1 });
            }

            let mut best_inv = (0usize, 0usize);
            let mut p = head[key(!data[i], !data[i + 1])];
            let mut steps = 0;
            while p != NIL && steps < depth {
                let src = p as usize;
                if src <= MAX_ABSOLUTE_SOURCE {
                    let len = match_len(data, src, i, cap, 0xFF);
                    if len > best_inv.0 {
                        best_inv = (len, src);
                        if len == cap {
                            break;
                        }
                    }
                }
                p = prev[src];
                steps += 1;
            }
            if best_inv.0 > 0 {
                ops.push(Op::Inverted { len: best_inv.0, src: best_inv.1 });
            }

            let k = key(data[i], data[i + 1]);
            prev[i] = head[k];
            head[k] = i as u32;
        }

        all.push(Candidates { ops });
    }

    all
}

fn savings(op: Op) -> isize {
    op.len() as isize - op.cost() as isize
}

fn parse_greedy(n: usize, candidates: &[Candidates]) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut literal_start: Option<usize> = None;
    let mut i = 0;

    while i < n {
        let best = candidates[i]
            .ops
            .iter()
            .copied()
            .max_by_key(|op| (savings(*op), std::cmp::Reverse(op.cost())));

        match best {
            Some(op) if savings(op) > 0 => {
                if let Some(start) = literal_start.take() {
                    ops.push(Op::Literal { len: i - start });
                }
                ops.push(op);
                i += op.len();
            }
            _ => {
                let start = *literal_start.get_or_insert(i);
                i += 1;
                if i - start == LONG_MAX_LEN {
                    ops.push(Op::Literal { len: LONG_MAX_LEN });
                    literal_start = None;
                }
            }
        }
    }

    if let Some(start) = literal_start {
        ops.push(Op::Literal { len: n - start });
    }
    ops
}

/// Point-update, range-minimum tree over `(cost, position)`.
struct MinTree {
    size: usize,
    nodes: Vec<(u64, usize)>,
}

impl MinTree {
    fn new(len: usize) -> Self {
        let size = len.next_power_of_two().max(1);
        MinTree {
            size,
            nodes: vec![(u64::MAX, usize::MAX); 2 * size],
        }
    }

    fn set(&mut self, pos: usize, cost: u64) {
        let mut idx = pos + self.size;
        self.nodes[idx] = (cost, pos);
        while idx > 1 {
            idx /= 2;
            self.nodes[idx] = self.nodes[2 * idx].min(self.nodes[2 * idx + 1]);
        }
    }

    /// Minimum over the inclusive range `[lo, hi]`.
    fn query(&self, lo: usize, hi: usize) -> (u64, usize) {
        let mut best = (u64::MAX, usize::MAX);
        let mut l = lo + self.size;
        let mut r = hi + self.size + 1;
        while l < r {
            if l & 1 == 1 {
                best = best.min(self.nodes[l]);
                l += 1;
            }
            if r & 1 == 1 {
                r -= 1;
                best = best.min(self.nodes[r]);
            }
            l /= 2;
            r /= 2;
        }
        best
    }
}

/// Smallest encoding reachable with the given candidates: a shortest path
/// from position 0 to `n`, where every command may be cut to any length.
fn parse_optimal(n: usize, candidates: &[Candidates]) -> Vec<Op> {
    let mut best = vec![u64::MAX; n + 1];
    let mut choice = vec![Op::Literal { len: 1 }; n];
    // Remaining cost from each position, and the same plus the position for
    // literal runs, whose size grows with their length.
    let mut rest = MinTree::new(n + 1);
    let mut rest_plus_pos = MinTree::new(n + 1);

    best[n] = 0;
    rest.set(n, 0);
    rest_plus_pos.set(n, n as u64);

    for i in (0..n).rev() {
        let mut best_cost = u64::MAX;
        let mut best_op = Op::Literal { len: 1 };

        let mut consider = |template: Op, max_len: usize, tree: &MinTree, by_pos: bool| {
            let max_len = max_len.min(n - i);
            let ranges = [
                (1, max_len.min(SHORT_MAX_LEN)),
                (SHORT_MAX_LEN + 1, max_len),
            ];
            for (lo, hi) in ranges {
                if lo > hi {
                    continue;
                }
                let (cost, j) = tree.query(i + lo, i + hi);
                if cost == u64::MAX {
                    continue;
                }
                let op = template.with_len(j - i);
                let total = if by_pos {
                    cost - i as u64 + (op.cost() - op.len()) as u64
                } else {
                    cost + op.cost() as u64
                };
                if total < best_cost {
                    best_cost = total;
                    best_op = op;
                }
            }
        };

        consider(Op::Literal { len: 1 }, LONG_MAX_LEN, &rest_plus_pos, true);
        for op in &candidates[i].ops {
            consider(*op, op.len(), &rest, false);
        }

        best[i] = best_cost;
        choice[i] = best_op;
        rest.set(i, best_cost);
        rest_plus_pos.set(i, best_cost + i as u64);
    }

    let mut ops = Vec::new();
    let mut i = 0;
    while i < n {
        let op = choice[i];
        ops.push(op);
        i += op.len();
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_lengths_cover_each_pattern() {
        let data = [5, 5, 5, 1, 2, 1, 2, 1, 7, 8, 9];
        let (fill, word, inc) = run_lengths(&data);
        assert_eq!(fill[0], 3);
        assert_eq!(fill[3], 1);
        assert_eq!(word[3], 5);
        assert_eq!(word[10], 1);
        assert_eq!(inc[7], 1);
        assert_eq!(inc[8], 3);
        assert_eq!(inc[3], 2);
    }

    #[test]
    fn min_tree_finds_range_minimum() {
        let mut tree = MinTree::new(10);
        for (i, cost) in [9u64, 4, 7, 4, 8, 1, 6, 3, 2, 5].iter().enumerate() {
            tree.set(i, *cost);
        }
        assert_eq!(tree.query(0, 4), (4, 1));
        assert_eq!(tree.query(2, 9), (1, 5));
        assert_eq!(tree.query(6, 6), (6, 6));
    }

    #[test]
    fn greedy_prefers_relative_over_absolute_repeat() {
        let data = [1u8, 5, 3, 9, 1, 5, 3, 9, 1, 5];
        let candidates = find_candidates(&data, CodecOptions::default());
        let ops = parse_greedy(data.len(), &candidates);
        assert_eq!(
            ops,
            vec![Op::Literal { len: 4 }, Op::Relative { len: 6, dist: 4 }]
        );
    }

    #[test]
    fn optimal_parse_covers_input_exactly() {
        let data: Vec<u8> = (0..3000u32).map(|i| ((i * 7) % 13) as u8).collect();
        let candidates = find_candidates(&data, CodecOptions::new(false, true));
        let ops = parse_optimal(data.len(), &candidates);
        assert_eq!(ops.iter().map(|op| op.len()).sum::<usize>(), data.len());
        assert!(ops.iter().all(|op| op.len() >= 1 && op.len() <= LONG_MAX_LEN));
    }
}
