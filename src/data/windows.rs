// ============================================================
// Layer 4 — Window Splitter
// ============================================================
// Cuts one document's token ids into fixed-length windows
// that overlap by (context_size - stride) tokens.
//
// For a sequence T of length L, context size C and stride K:
//
//   1. emit T[0 : C]
//   2. start = K
//      while start + C < L + 2K:
//          emit T[start : start + C]
//          start += K
//   3. post-pad / post-truncate every window to exactly C
//
// Example with C=4, K=2, L=7 (ids a..g):
//   Window 1: a b c d          (start 0)
//   Window 2: c d e f          (start 2)
//   Window 3: e f g _          (start 4, padded)
//   Window 4: g _ _ _          (start 6, padded)
//   start 8: 8 + 4 < 7 + 4 is false → stop
//
// The `+ 2K` slack in the loop bound means the last window is
// often mostly (sometimes entirely) padding. Window counts, and
// with them the step counts of a run, depend on this bound.
//
// Reference: Rust Book §8 (Slices)

use anyhow::{bail, Result};

use crate::domain::window::Window;

#[derive(Debug, Clone, Copy)]
pub struct WindowSplitter {
    /// Tokens per window (C)
    context_size: usize,
    /// Distance between consecutive window starts (K)
    stride: usize,
    /// Id used to right-pad short windows
    pad_id: u32,
}

impl WindowSplitter {
    /// Create a splitter. Requires `0 < stride <= context_size`:
    /// a zero stride never advances and a stride above C skips tokens.
    /// `stride == context_size` gives adjacent, non-overlapping windows.
    pub fn new(context_size: usize, stride: usize, pad_id: u32) -> Result<Self> {
        if stride == 0 || stride > context_size {
            bail!(
                "stride ({}) must be in 1..={} (context size)",
                stride,
                context_size
            );
        }
        Ok(Self { context_size, stride, pad_id })
    }

    pub fn context_size(&self) -> usize {
        self.context_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    /// Split one token sequence. Never fails: an empty sequence
    /// yields a single fully padded window.
    pub fn split(&self, tokens: &[u32]) -> Vec<Window> {
        let (c, k) = (self.context_size, self.stride);
        let len = tokens.len();

        let mut windows = Vec::with_capacity(self.window_count(len));
        windows.push(self.window_at(tokens, 0));

        let mut start = k;
        while start + c < len + 2 * k {
            windows.push(self.window_at(tokens, start));
            start += k;
        }

        windows
    }

    /// Number of windows `split` produces for a sequence of `len` tokens:
    /// 1 + #{ j >= 1 : j*K + C < len + 2K }.
    pub fn window_count(&self, len: usize) -> usize {
        let (c, k) = (self.context_size, self.stride);
        let bound = len + 2 * k;
        if bound <= c {
            return 1;
        }
        1 + (bound - c - 1) / k
    }

    /// T[start : start + C], clamped to the sequence, then padded.
    fn window_at(&self, tokens: &[u32], start: usize) -> Window {
        let from = start.min(tokens.len());
        let to = (start + self.context_size).min(tokens.len());
        Window::padded(tokens[from..to].to_vec(), self.context_size, self.pad_id)
    }
}
