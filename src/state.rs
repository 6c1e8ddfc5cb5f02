//! Canonical enumeration of hidden states and observation vectors.
//!
//! Both lists are generated lazily by arithmetic on an index, never materialized as a `Vec`
//! of vectors, since their length grows exponentially in the number of LNLs.

use crate::node::AllowedStates;

/// Converts a flat index into its base-`radix` little-endian digit expansion of length
/// `digits`. Digit `0` is the least significant: `index = sum(digit[k] * radix^k)`.
fn index_to_digits(mut index: usize, radix: usize, digits: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(digits);
    for _ in 0..digits {
        out.push(index % radix);
        index /= radix;
    }
    out
}

/// Inverse of [`index_to_digits`].
fn digits_to_index(digits: &[usize], radix: usize) -> usize {
    digits
        .iter()
        .rev()
        .fold(0usize, |acc, &d| acc * radix + d)
}

/// The ordered sequence of all hidden state vectors of a graph with `num_lnls` LNLs, each
/// taking values in `allowed_states`.
///
/// State `i`'s vector is the base-`|allowed_states|` digit expansion of `i`, one digit per
/// LNL in canonical ([`crate::graph::Graph::lnls`]) order; digit `0` corresponds to the first
/// LNL in that order.
#[derive(Clone, Copy, Debug)]
pub struct StateList {
    allowed_states: AllowedStates,
    num_lnls: usize,
}

impl StateList {
    pub fn new(allowed_states: AllowedStates, num_lnls: usize) -> StateList {
        StateList {
            allowed_states,
            num_lnls,
        }
    }

    pub fn len(&self) -> usize {
        self.allowed_states.cardinality().pow(self.num_lnls as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.num_lnls == 0
    }

    /// The state vector at position `index`.
    pub fn state_at(&self, index: usize) -> Vec<usize> {
        index_to_digits(index, self.allowed_states.cardinality(), self.num_lnls)
    }

    /// The position of `state` in the canonical ordering.
    pub fn index_of(&self, state: &[usize]) -> usize {
        debug_assert_eq!(state.len(), self.num_lnls);
        digits_to_index(state, self.allowed_states.cardinality())
    }

    pub fn iter(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        (0..self.len()).map(move |i| self.state_at(i))
    }
}

/// The ordered sequence of all observation vectors for `num_lnls` LNLs diagnosed by
/// `num_modalities` modalities. Each entry is binary (observed positive / negative); the
/// position of the `(lnl, modality)` pair within a vector is `lnl_idx * num_modalities +
/// modality_idx`.
#[derive(Clone, Copy, Debug)]
pub struct ObservationList {
    num_lnls: usize,
    num_modalities: usize,
}

impl ObservationList {
    pub fn new(num_lnls: usize, num_modalities: usize) -> ObservationList {
        ObservationList {
            num_lnls,
            num_modalities,
        }
    }

    pub fn num_entries(&self) -> usize {
        self.num_lnls * self.num_modalities
    }

    pub fn len(&self) -> usize {
        1usize << self.num_entries()
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries() == 0
    }

    /// Index, within an observation vector, of the `(lnl_idx, modality_idx)` entry.
    pub fn entry_position(&self, lnl_idx: usize, modality_idx: usize) -> usize {
        lnl_idx * self.num_modalities + modality_idx
    }

    /// The observation vector (one bool per `(lnl, modality)` pair) at position `index`.
    pub fn observation_at(&self, index: usize) -> Vec<bool> {
        index_to_digits(index, 2, self.num_entries())
            .into_iter()
            .map(|d| d == 1)
            .collect()
    }

    pub fn index_of(&self, observation: &[bool]) -> usize {
        debug_assert_eq!(observation.len(), self.num_entries());
        let digits: Vec<usize> = observation.iter().map(|&b| b as usize).collect();
        digits_to_index(&digits, 2)
    }

    pub fn iter(&self) -> impl Iterator<Item = Vec<bool>> + '_ {
        (0..self.len()).map(move |i| self.observation_at(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_list_round_trips() {
        let sl = StateList::new(AllowedStates::Trinary, 2);
        assert_eq!(sl.len(), 9);
        for i in 0..sl.len() {
            let state = sl.state_at(i);
            assert_eq!(sl.index_of(&state), i);
        }
        assert_eq!(sl.state_at(0), vec![0, 0]);
        assert_eq!(sl.state_at(1), vec![1, 0]);
        assert_eq!(sl.state_at(3), vec![0, 1]);
    }

    #[test]
    fn observation_list_round_trips() {
        let ol = ObservationList::new(2, 2);
        assert_eq!(ol.len(), 16);
        for i in 0..ol.len() {
            let obs = ol.observation_at(i);
            assert_eq!(ol.index_of(&obs), i);
        }
    }
}
