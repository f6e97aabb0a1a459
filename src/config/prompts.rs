//! Prompt templates for Finsight.
//!
//! The extraction prompt can be customized by placing an `extraction.toml`
//! in the custom prompts directory. A template must carry the `{{title}}`
//! and `{{text}}` placeholders; a template that is present but unreadable or
//! invalid is a configuration error — the caller disables the LLM path
//! rather than extracting with a broken prompt.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub extraction: ExtractionPrompt,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompt for structured financial extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionPrompt {
    pub template: String,
}

impl Default for ExtractionPrompt {
    fn default() -> Self {
        Self {
            template: r#"You are a financial information extraction engine. Analyze the transcript of a financial commentary video and extract structured investment information.

Video title: {{title}}

Transcript:
{{text}}

Produce a single JSON object with exactly these fields:

- "summary": concise summary of the entire analysis
- "market_overview": object with:
  - "date": analysis date in YYYY-MM-DD format ("" if not stated)
  - "major_indices": array of {"name", "performance", "current_level" (optional), "key_levels" (optional array of strings), "analysis" (optional)}
  - "market_sentiment": overall market sentiment and its drivers
- "macroeconomic_data": array of {"indicator", "impact", "actual_value"/"expected_value"/"previous_value"/"interpretation" (all optional)}
- "stock_analysis": array of {"symbol", "key_points" (array of strings), "company_name"/"current_price"/"price_change" (optional), "price_levels" (optional object with "support"/"resistance"/"target" string arrays), "recommendation" (optional, one of 买入/持有/卖出/观望), "risk_reward_ratio"/"analyst_notes" (optional)}
- "key_events": array of {"event", "impact", "date" (optional), "category" (optional, one of 财报/政策/经济数据/企业行为/其他)}
- "investment_advice": array of {"advice", "timeframe" (one of 短期/中期/长期), "rationale"/"target_audience" (optional)}
- "risks_and_warnings": array of {"risk", "severity" (one of 低/中/高), "probability" (optional, one of 低/中/高), "mitigation" (optional)}

Extraction rules:
1. Only extract facts explicitly stated in the transcript. Never infer, never invent.
2. Use ISO date format (YYYY-MM-DD) for every date.
3. Map company names to their exchange ticker symbols for major names (e.g. 特斯拉 -> TSLA, 英伟达 -> NVDA).
4. Every list field must be present; use an empty array when nothing applies.
5. Respond with the JSON object only. No markdown fences, no surrounding prose."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default templates, with optional custom
    /// directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let extraction_path = custom_path.join("extraction.toml");
            if extraction_path.exists() {
                let content = std::fs::read_to_string(&extraction_path)?;
                prompts.extraction = toml::from_str(&content)?;
            }
        }

        prompts.validate()?;
        Ok(prompts)
    }

    /// Ensure the extraction template carries both required placeholders.
    fn validate(&self) -> crate::error::Result<()> {
        for placeholder in ["{{title}}", "{{text}}"] {
            if !self.extraction.template.contains(placeholder) {
                return Err(crate::error::FinsightError::Config(format!(
                    "extraction prompt template is missing the {placeholder} placeholder"
                )));
            }
        }
        Ok(())
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render with both provided variables and custom config variables.
    /// Provided variables take precedence.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Build the extraction prompt for one transcript.
    pub fn extraction_prompt(&self, title: &str, text: &str) -> String {
        let mut vars = std::collections::HashMap::new();
        vars.insert("title".to_string(), title.to_string());
        vars.insert("text".to_string(), text.to_string());
        self.render_with_custom(&self.extraction.template, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_has_placeholders() {
        let prompts = Prompts::default();
        assert!(prompts.extraction.template.contains("{{title}}"));
        assert!(prompts.extraction.template.contains("{{text}}"));
        assert!(prompts.validate().is_ok());
    }

    #[test]
    fn test_extraction_prompt_embeds_inputs() {
        let prompts = Prompts::default();
        let rendered = prompts.extraction_prompt("Tech Update", "NVDA rose 3%");

        assert!(rendered.contains("Tech Update"));
        assert!(rendered.contains("NVDA rose 3%"));
        assert!(!rendered.contains("{{title}}"));
        assert!(!rendered.contains("{{text}}"));
    }

    #[test]
    fn test_validate_rejects_missing_placeholder() {
        let prompts = Prompts {
            extraction: ExtractionPrompt { template: "only {{title}} here".to_string() },
            variables: Default::default(),
        };
        assert!(prompts.validate().is_err());
    }

    #[test]
    fn test_render_template() {
        let template = "Title: {{title}}, body: {{text}}.";
        let mut vars = std::collections::HashMap::new();
        vars.insert("title".to_string(), "A".to_string());
        vars.insert("text".to_string(), "B".to_string());

        assert_eq!(Prompts::render(template, &vars), "Title: A, body: B.");
    }
}
