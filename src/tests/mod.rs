use super::*;

// Shared helpers: deterministic pseudo-random chunk splitting so streaming
// tests cover arbitrary fragment boundaries reproducibly.
fn split_sizes(seed: u64, total_len: usize) -> Vec<usize> {
    // Knuth's MMIX multiplier; sizes drawn from the high bits, 1..=13
    const MUL: u64 = 6364136223846793005;
    const INC: u64 = 1442695040888963407;
    let mut state = seed ^ MUL;
    let mut sizes = Vec::new();
    let mut covered = 0usize;
    while covered < total_len {
        state = state.wrapping_mul(MUL).wrapping_add(INC);
        let step = usize::min(((state >> 33) as usize % 13) + 1, total_len - covered);
        sizes.push(step);
        covered += step;
    }
    sizes
}

fn chunk_by_char(s: &str, sizes: &[usize]) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut iter = s.chars();
    for &n in sizes {
        let chunk: String = iter.by_ref().take(n).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }
    let rest: String = iter.collect();
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

// Submodules (topic-based)
mod chunked;
#[cfg(feature = "proxy")]
mod proxy_sse;
