//! Voting over several replies to the same prompt, for self-consistency.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref ANSWER_PATTERNS: [Regex; 4] = [
        Regex::new(r"(?i)(?:final answer|answer|conclusion):\s*([^\n.]+)").unwrap(),
        Regex::new(r"(?i)\b(?:therefore|thus|so),?\s*([^\n.]+)").unwrap(),
        Regex::new(r"(?i)answer is\s*([^\n.]+)").unwrap(),
        Regex::new(r"(?i)result is\s*([^\n.]+)").unwrap(),
    ];
    static ref NUMBER_WITH_UNIT_RE: Regex = Regex::new(r"(\d+(?:\.\d+)?(?:\s*(?:km/h|mph|hours?|minutes?|seconds?|meters?|km|m))?)").unwrap();
    static ref NUMBER_RE: Regex = Regex::new(r"(\d+(?:\.\d+)?)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteResult {
    pub winner: String,
    /// Share of responses voting for the winner
    pub confidence: f64,
    /// Candidates in order of first appearance with their vote counts
    pub vote_counts: Vec<(String, usize)>,
    pub total_responses: usize,
    pub analysis: String,
}

impl VoteResult {
    fn empty() -> Self {
        Self {
            winner: String::new(),
            confidence: 0.0,
            vote_counts: Vec::new(),
            total_responses: 0,
            analysis: "No responses provided".to_string(),
        }
    }

    /// First candidate with the highest count wins ties.
    fn tally(vote_counts: Vec<(String, usize)>, total_responses: usize, describe: impl FnOnce(&str, usize, f64) -> String) -> Self {
        let (winner, winner_count) = vote_counts.iter()
            .fold(None, |best: Option<(&String, usize)>, (candidate, count)| match best {
                Some((_, best_count)) if best_count >= *count => best,
                _ => Some((candidate, *count)),
            })
            .map(|(winner, count)| (winner.clone(), count))
            .unwrap_or_default();
        let confidence = winner_count as f64 / total_responses as f64;
        let analysis = describe(&winner, winner_count, confidence);
        Self {
            winner,
            confidence,
            vote_counts,
            total_responses,
            analysis,
        }
    }
}

fn count_in_order<'a>(items: impl Iterator<Item=&'a str>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(candidate, _)| candidate == item) {
            Some((_, count)) => *count += 1,
            None => counts.push((item.to_string(), 1)),
        }
    }
    counts
}

/// Exact-match majority vote over whole responses.
pub fn majority_vote(responses: &[String]) -> VoteResult {
    if responses.is_empty() {
        return VoteResult::empty();
    }
    let total = responses.len();
    VoteResult::tally(count_in_order(responses.iter().map(String::as_str)), total, |_, count, confidence| {
        format!("Winner selected with {}/{} votes ({:.1}% confidence)", count, total, confidence * 100.0)
    })
}

/// Pull the final answer out of a reasoning trace.
///
/// Tries explicit answer markers first, then the first number (with an optional unit), then the last sentence.
pub fn extract_final_answer(response: &str) -> String {
    let response = response.trim();
    for pattern in ANSWER_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(response) {
            return captures[1].trim().to_string();
        }
    }
    if let Some(captures) = NUMBER_WITH_UNIT_RE.captures(response) {
        return captures[1].trim().to_string();
    }
    response.split('.')
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .last()
        .unwrap_or(response)
        .to_string()
}

fn first_number(text: &str) -> Option<f64> {
    NUMBER_RE.captures(text).and_then(|c| c[1].parse().ok())
}

/// Whether two extracted answers mean the same thing: equal ignoring case, one containing the other (both longer
/// than 5 characters), or first numbers within 0.1 of each other.
pub fn are_similar_answers(first: &str, second: &str) -> bool {
    if first.is_empty() || second.is_empty() {
        return false;
    }
    let first = first.trim().to_lowercase();
    let second = second.trim().to_lowercase();
    if first == second {
        return true;
    }
    if first.len() > 5 && second.len() > 5 && (first.contains(&second) || second.contains(&first)) {
        return true;
    }
    match (first_number(&first), first_number(&second)) {
        (Some(a), Some(b)) => (a - b).abs() < 0.1,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticVote {
    pub vote: VoteResult,
    /// Group representative and the indices of the responses in the group
    pub answer_groups: Vec<(String, Vec<usize>)>,
}

/// Vote over extracted final answers, grouping answers that are similar.
pub fn semantic_vote(responses: &[String]) -> SemanticVote {
    if responses.is_empty() {
        return SemanticVote { vote: VoteResult::empty(), answer_groups: Vec::new() };
    }
    let mut answer_groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (index, answer) in responses.iter().map(|r| extract_final_answer(r)).enumerate() {
        match answer_groups.iter_mut().find(|(key, _)| are_similar_answers(&answer, key)) {
            Some((_, members)) => members.push(index),
            None => answer_groups.push((answer, vec![index])),
        }
    }
    let total = responses.len();
    let vote_counts = answer_groups.iter().map(|(key, members)| (key.clone(), members.len())).collect();
    let vote = VoteResult::tally(vote_counts, total, |winner, count, confidence| {
        format!("Semantic winner: '{}' with {}/{} votes ({:.1}% confidence)", winner, count, total, confidence * 100.0)
    });
    SemanticVote { vote, answer_groups }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    /// `1 - (unique answers - 1) / responses`
    pub consistency_score: f64,
    /// Share of responses agreeing with the most common answer
    pub agreement_ratio: f64,
    pub unique_answers: usize,
    pub total_responses: usize,
    pub answers: Vec<String>,
    pub analysis: String,
}

pub fn analyze_consistency(responses: &[String]) -> ConsistencyReport {
    let answers: Vec<String> = responses.iter().map(|r| extract_final_answer(r)).collect();
    let total = answers.len();
    if total < 2 {
        return ConsistencyReport {
            consistency_score: 1.0,
            agreement_ratio: 1.0,
            unique_answers: total,
            total_responses: total,
            answers,
            analysis: "Cannot measure consistency with < 2 responses".to_string(),
        };
    }
    let counts = count_in_order(answers.iter().map(String::as_str));
    let unique_answers = counts.len();
    let most_common = counts.iter().map(|(_, count)| *count).max().unwrap_or(0);
    let consistency_score = 1.0 - (unique_answers - 1) as f64 / total as f64;
    let agreement_ratio = most_common as f64 / total as f64;
    ConsistencyReport {
        consistency_score,
        agreement_ratio,
        unique_answers,
        total_responses: total,
        analysis: format!("Found {} unique answers out of {} responses. Consistency score: {:.2}, Agreement ratio: {:.2}",
                          unique_answers, total, consistency_score, agreement_ratio),
        answers,
    }
}
