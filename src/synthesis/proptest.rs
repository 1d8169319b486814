//! Property tests for response parsing and transcript scrubbing.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::conversation::{prune_tool_results, strip_memory_markup};
    use crate::synthesis::parser::{parse_analysis, parse_title_folder_pairs};

    proptest! {
        // ==================== Parser Robustness ====================

        #[test]
        fn analysis_parser_never_panics(raw in any::<String>()) {
            let _ = parse_analysis(&raw);
        }

        #[test]
        fn parser_handles_brace_noise(raw in "[\\{\\}\\[\\]:,\"a-z0-9 ]{0,200}") {
            let _ = parse_analysis(&raw);
            let _ = parse_title_folder_pairs(&raw);
        }

        #[test]
        fn braceless_input_is_always_the_sentinel(raw in "[^{}]*") {
            prop_assert!(parse_analysis(&raw).is_empty());
        }

        #[test]
        fn well_formed_main_always_decodes(
            title in "[A-Za-z0-9 ]{1,40}",
            content in "[A-Za-z0-9 ]{0,80}",
            folder in "[a-z/]{0,20}",
        ) {
            let payload = serde_json::json!({
                "main": [title.clone(), content.clone(), [], folder]
            });
            let analysis = parse_analysis(&payload.to_string());
            let main = analysis.main_problem.expect("main should decode");
            prop_assert_eq!(main.title, title);
            prop_assert_eq!(main.content, content);
        }

        // ==================== Transcript Scrubbing ====================

        #[test]
        fn scrubbing_never_panics(raw in any::<String>()) {
            let _ = prune_tool_results(&raw);
            let _ = strip_memory_markup(&raw);
        }

        #[test]
        fn memory_blocks_never_survive_scrubbing(
            before in "[^<]{0,60}",
            inner in "[^<]{0,60}",
            after in "[^<]{0,60}",
        ) {
            let text = format!("{}<memory>{}</memory>{}", before, inner, after);
            prop_assert!(!strip_memory_markup(&text).contains("<memory>"));
        }

        #[test]
        fn pruned_tool_bodies_never_survive(
            attrs in "[ a-z=\"']{0,30}",
            body in "[^<]{1,120}",
        ) {
            let text = format!("<tool_result{}>{}</tool_result>", attrs, body);
            let pruned = prune_tool_results(&text);
            let expected = format!("<tool_result{}>[tool output pruned]</tool_result>", attrs);
            prop_assert_eq!(pruned, expected);
        }
    }
}
