//! Aggregation view definitions for the per-shop prompt logs.
//!
//! Both views live in the `list` design document of each shop's log
//! database and are synchronized by
//! [`PromptLog::prepare`](crate::repositories::PromptLog::prepare).
//!
//! The reduce functions follow CouchDB's two-mode contract: a leaf call
//! receives raw per-document values, a re-reduce call receives prior
//! reduce outputs, and the engine is free to mix the two incrementally.
//! Getting either mode wrong silently corrupts counts, so the contract
//! is pinned by `tests/view_contract.rs`.

use geodirect_couch::ViewDefinition;

/// Design document holding the prompt-log views.
pub const LIST_DESIGN_DOC: &str = "list";

/// Counts prompts keyed by their timestamp.
///
/// Reduced without grouping and with a `start_key` bound, this yields
/// the number of prompts logged on or after a given instant. The leaf
/// pass counts raw emitted values (`values.length`, the keys are
/// timestamps, not numbers to add); the re-reduce pass sums the partial
/// counts.
pub const COUNT_BY_TIMESTAMP: ViewDefinition = ViewDefinition {
    design_doc: LIST_DESIGN_DOC,
    name: "count-by-timestamp",
    map: "\
function (doc) {
    emit(doc.timestamp);
}",
    reduce: Some(
        "\
function (keys, values, rereduce) {
    if (rereduce) {
        return sum(values);
    }

    return values.length;
}",
    ),
};

/// Counts prompts grouped by the geodirect rule that triggered them.
///
/// The leaf pass builds a rule-id to count mapping from the emitted
/// keys; the re-reduce pass merges prior mappings by summing counts per
/// rule id. Queried grouped, each row's value is such a mapping.
pub const COUNT_BY_GEODIRECT: ViewDefinition = ViewDefinition {
    design_doc: LIST_DESIGN_DOC,
    name: "count-by-geodirects",
    map: "\
function (doc) {
    emit(doc.geodirect_id);
}",
    reduce: Some(
        "\
function (keys, values, rereduce) {
    if (rereduce) {
        return values.reduce(function (merged, counts) {
            for (var id in counts) {
                merged[id] = (merged[id] || 0) + counts[id];
            }

            return merged;
        }, {});
    }

    return keys.reduce(function (counts, key) {
        var id = key[0];

        counts[id] = (counts[id] || 0) + 1;

        return counts;
    }, {});
}",
    ),
};

/// Every view a shop's log database must carry.
pub const PROMPT_LOG_VIEWS: [ViewDefinition; 2] = [COUNT_BY_TIMESTAMP, COUNT_BY_GEODIRECT];
