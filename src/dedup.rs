// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Consecutive-duplicate removal within one session.
//!
//! Chat archiving modules occasionally write the same message twice in a
//! row. This pass collapses each maximal run of adjacent utterances with
//! identical speaker and text down to its first occurrence, diverting the
//! repeats to a separate list so they can be documented rather than lost.
//!
//! Only adjacent repeats count. The same line said again later in the
//! session is a deliberate repetition and stays. Blank utterances are
//! never treated as duplicates, and a blank between two identical lines
//! breaks the run.

use crate::transcript::Utterance;

/// Splits a session's utterances into the kept sequence and the omitted
/// repeats, both in original order.
///
/// Running the result through this function again changes nothing: the
/// kept sequence contains no adjacent duplicates by construction.
#[must_use]
pub fn split_consecutive_duplicates(utterances: Vec<Utterance>) -> (Vec<Utterance>, Vec<Utterance>) {
    let mut kept = Vec::new();
    let mut omitted = Vec::new();
    let mut last_key: Option<(String, String)> = None;

    for utterance in utterances {
        let key = (utterance.speaker.clone(), utterance.text.clone());
        if !utterance.text.is_empty() && last_key.as_ref() == Some(&key) {
            omitted.push(utterance);
            continue;
        }
        last_key = if utterance.text.is_empty() {
            None
        } else {
            Some(key)
        };
        kept.push(utterance);
    }

    (kept, omitted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utt(speaker: &str, text: &str) -> Utterance {
        Utterance {
            speaker: speaker.to_owned(),
            spans: Vec::new(),
            text: text.to_owned(),
            narration: false,
        }
    }

    fn texts(utterances: &[Utterance]) -> Vec<&str> {
        utterances.iter().map(|u| u.text.as_str()).collect()
    }

    #[test]
    fn empty_input_splits_to_empty() {
        let (kept, omitted) = split_consecutive_duplicates(Vec::new());
        assert!(kept.is_empty());
        assert!(omitted.is_empty());
    }

    #[test]
    fn single_utterance_is_kept() {
        let (kept, omitted) = split_consecutive_duplicates(vec![utt("A", "hello")]);
        assert_eq!(texts(&kept), ["hello"]);
        assert!(omitted.is_empty());
    }

    #[test]
    fn collapses_a_run_to_its_first_occurrence() {
        let input = vec![
            utt("A", "hello"),
            utt("A", "hello"),
            utt("A", "hello"),
            utt("B", "hi"),
        ];
        let (kept, omitted) = split_consecutive_duplicates(input);
        assert_eq!(texts(&kept), ["hello", "hi"]);
        assert_eq!(texts(&omitted), ["hello", "hello"]);
    }

    #[test]
    fn keeps_non_adjacent_repeats() {
        let input = vec![utt("A", "hello"), utt("B", "hi"), utt("A", "hello")];
        let (kept, omitted) = split_consecutive_duplicates(input);
        assert_eq!(kept.len(), 3);
        assert!(omitted.is_empty());
    }

    #[test]
    fn same_text_different_speaker_is_not_a_duplicate() {
        let input = vec![utt("A", "hello"), utt("B", "hello")];
        let (kept, omitted) = split_consecutive_duplicates(input);
        assert_eq!(kept.len(), 2);
        assert!(omitted.is_empty());
    }

    #[test]
    fn blank_breaks_a_run() {
        let input = vec![utt("A", "hello"), utt("A", ""), utt("A", "hello")];
        let (kept, omitted) = split_consecutive_duplicates(input);
        assert_eq!(kept.len(), 3);
        assert!(omitted.is_empty());
    }

    #[test]
    fn blanks_are_never_omitted() {
        let input = vec![utt("A", ""), utt("A", ""), utt("A", "")];
        let (kept, omitted) = split_consecutive_duplicates(input);
        assert_eq!(kept.len(), 3);
        assert!(omitted.is_empty());
    }

    #[test]
    fn is_idempotent() {
        let input = vec![
            utt("A", "x"),
            utt("A", "x"),
            utt("B", "y"),
            utt("B", ""),
            utt("B", "y"),
        ];
        let (kept, _) = split_consecutive_duplicates(input);
        let (again, omitted) = split_consecutive_duplicates(kept.clone());
        assert_eq!(again, kept);
        assert!(omitted.is_empty());
    }

    /// The obvious run-scanning statement of the rule, for cross-checking.
    fn reference_split(utterances: &[Utterance]) -> (Vec<usize>, Vec<usize>) {
        let mut kept = Vec::new();
        let mut omitted = Vec::new();
        let mut i = 0;
        while i < utterances.len() {
            kept.push(i);
            if utterances[i].text.is_empty() {
                i += 1;
                continue;
            }
            let mut j = i + 1;
            while j < utterances.len()
                && utterances[j].speaker == utterances[i].speaker
                && utterances[j].text == utterances[i].text
            {
                omitted.push(j);
                j += 1;
            }
            i = j;
        }
        (kept, omitted)
    }

    #[test]
    fn matches_reference_on_all_short_sequences() {
        let alphabet = [("Ari", "hello"), ("Ari", "later"), ("Brin", "hello"), ("Ari", "")];

        for len in 0..=5 {
            let mut indices = vec![0usize; len];
            loop {
                let seq: Vec<Utterance> = indices
                    .iter()
                    .map(|&i| {
                        let (speaker, text) = alphabet[i];
                        utt(speaker, text)
                    })
                    .collect();

                let (kept, omitted) = split_consecutive_duplicates(seq.clone());
                let (ref_kept, ref_omitted) = reference_split(&seq);

                let expect_kept: Vec<Utterance> =
                    ref_kept.iter().map(|&i| seq[i].clone()).collect();
                let expect_omitted: Vec<Utterance> =
                    ref_omitted.iter().map(|&i| seq[i].clone()).collect();
                assert_eq!(kept, expect_kept, "kept mismatch for {seq:?}");
                assert_eq!(omitted, expect_omitted, "omitted mismatch for {seq:?}");

                // Re-merging kept and omitted by index reconstructs the input.
                let mut merged: Vec<usize> =
                    ref_kept.iter().chain(&ref_omitted).copied().collect();
                merged.sort_unstable();
                assert_eq!(merged, (0..seq.len()).collect::<Vec<_>>());

                // A second pass over the kept sequence removes nothing.
                let (again, none) = split_consecutive_duplicates(kept.clone());
                assert_eq!(again, kept);
                assert!(none.is_empty());

                let mut pos = 0;
                loop {
                    if pos == len {
                        break;
                    }
                    indices[pos] += 1;
                    if indices[pos] < alphabet.len() {
                        break;
                    }
                    indices[pos] = 0;
                    pos += 1;
                }
                if pos == len {
                    break;
                }
            }
        }
    }
}
