// Copyright 2025 ScreenGraph Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixed-capacity batch accumulator. Every accepted record ends up in
//! exactly one emitted batch; the trailing partial batch is drained by
//! `flush` at end of stream.

pub struct Batcher<T> {
    capacity: usize,
    buf: Vec<T>,
}

impl<T> Batcher<T> {
    pub fn new(capacity: usize) -> Batcher<T> {
        Batcher {
            capacity: capacity.max(1),
            buf: Vec::with_capacity(capacity.max(1)),
        }
    }

    /// Returns a full batch when the capacity threshold is reached.
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.buf.push(item);
        if self.buf.len() >= self.capacity {
            Some(std::mem::replace(
                &mut self.buf,
                Vec::with_capacity(self.capacity),
            ))
        } else {
            None
        }
    }

    /// Drains whatever remains. Returns `None` when nothing is pending.
    pub fn flush(&mut self) -> Option<Vec<T>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_full_batches_and_trailing_remainder() {
        let mut b = Batcher::new(3);
        let mut emitted: Vec<Vec<u32>> = Vec::new();
        for i in 0..7 {
            if let Some(batch) = b.push(i) {
                emitted.push(batch);
            }
        }
        if let Some(batch) = b.flush() {
            emitted.push(batch);
        }
        assert_eq!(emitted.len(), 3);
        assert_eq!(emitted[0], vec![0, 1, 2]);
        assert_eq!(emitted[2], vec![6]);
        let total: usize = emitted.iter().map(|b| b.len()).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn flush_on_empty_is_none() {
        let mut b: Batcher<u32> = Batcher::new(4);
        assert!(b.flush().is_none());
        b.push(1);
        assert_eq!(b.flush(), Some(vec![1]));
        assert!(b.flush().is_none());
    }
}
