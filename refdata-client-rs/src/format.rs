//! Result shaping
//!
//! Turns raw upstream search payloads into the results handed to consumers.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::services::refdata::{
    EntityStats, IndexMatch, IndexSearchResponse, IndexSearchResult, TextSearchResponse,
    TextSearchResult,
};

/// Shapes raw search payloads
pub trait ResultFormatter: Send + Sync {
    fn format_index_results(
        &self,
        query: &str,
        index: &str,
        response: IndexSearchResponse,
        limit: usize,
    ) -> IndexSearchResult;

    fn format_text_results(
        &self,
        query: &str,
        text: &str,
        response: TextSearchResponse,
        limit: usize,
    ) -> TextSearchResult;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultFormatter;

impl DefaultFormatter {
    pub fn new() -> Self {
        Self
    }
}

/// Per-entity match count and cumulative weight
///
/// Heaviest first; ties broken by count, then by name.
pub fn entity_stats(matches: &[IndexMatch]) -> Vec<EntityStats> {
    let mut by_entity: HashMap<&str, EntityStats> = HashMap::new();

    for m in matches {
        let stats = by_entity
            .entry(m.entity_id.as_str())
            .or_insert_with(|| EntityStats {
                entity_id: m.entity_id.clone(),
                entity_name: m.entity_name.clone(),
                match_count: 0,
                total_weight: 0.0,
            });
        stats.match_count += 1;
        stats.total_weight += m.weight;
    }

    let mut stats: Vec<EntityStats> = by_entity.into_values().collect();
    stats.sort_by(|a, b| {
        b.total_weight
            .partial_cmp(&a.total_weight)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.match_count.cmp(&a.match_count))
            .then_with(|| a.entity_name.cmp(&b.entity_name))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    stats
}

impl ResultFormatter for DefaultFormatter {
    fn format_index_results(
        &self,
        query: &str,
        index: &str,
        response: IndexSearchResponse,
        limit: usize,
    ) -> IndexSearchResult {
        let total_matches = response.total.unwrap_or(response.matches.len() as u64);

        // Stats cover every match, not only the ones returned
        let mut entity_stats = entity_stats(&response.matches);
        entity_stats.truncate(limit);

        let mut matches = response.matches;
        matches.truncate(limit);

        IndexSearchResult {
            query: query.to_string(),
            index: index.to_string(),
            total_matches,
            matches,
            entity_stats,
        }
    }

    fn format_text_results(
        &self,
        query: &str,
        text: &str,
        response: TextSearchResponse,
        limit: usize,
    ) -> TextSearchResult {
        let total_sections = response.total.unwrap_or(response.sections.len() as u64);
        let mut sections = response.sections;
        sections.truncate(limit);

        TextSearchResult {
            query: query.to_string(),
            text: text.to_string(),
            total_sections,
            sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::refdata::TextSection;

    fn hit(id: &str, name: &str, group: &str, weight: f64) -> IndexMatch {
        IndexMatch {
            entity_id: id.to_string(),
            entity_name: name.to_string(),
            group: group.to_string(),
            weight,
            term: None,
        }
    }

    #[test]
    fn test_entity_stats_ordering() {
        let matches = vec![
            hit("b", "Beta", "g1", 1.0),
            hit("a", "Alpha", "g1", 2.0),
            hit("b", "Beta", "g2", 1.0),
            hit("c", "Gamma", "g3", 0.5),
            hit("d", "Delta", "g3", 2.0),
        ];

        let stats = entity_stats(&matches);
        let order: Vec<_> = stats.iter().map(|s| s.entity_id.as_str()).collect();

        // a, b and d all weigh 2.0; b has two matches, a sorts before d by name
        assert_eq!(order, vec!["b", "a", "d", "c"]);
        assert_eq!(stats[0].match_count, 2);
        assert_eq!(stats[0].total_weight, 2.0);
    }

    #[test]
    fn test_index_results_are_limited() {
        let response = IndexSearchResponse {
            total: None,
            matches: vec![
                hit("a", "Alpha", "g1", 1.0),
                hit("b", "Beta", "g1", 1.0),
                hit("b", "Beta", "g2", 5.0),
            ],
        };

        let result = DefaultFormatter::new().format_index_results("q", "main", response, 1);
        assert_eq!(result.total_matches, 3);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.entity_stats.len(), 1);
        // Computed before the matches were cut
        assert_eq!(result.entity_stats[0].entity_id, "b");
        assert_eq!(result.entity_stats[0].total_weight, 6.0);
    }

    #[test]
    fn test_text_results_keep_upstream_total() {
        let response = TextSearchResponse {
            total: Some(40),
            sections: vec![TextSection::default(), TextSection::default()],
        };

        let result = DefaultFormatter::new().format_text_results("q", "articles", response, 1);
        assert_eq!(result.total_sections, 40);
        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.text, "articles");
    }
}
