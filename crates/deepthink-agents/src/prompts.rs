//! Prompt templates for the LLM-backed agents
//!
//! Templates are compiled once into a MiniJinja [`Environment`] and rendered
//! with serde contexts. Fetched data is flattened to plain `key: value` text
//! by [`format_data`] before it is handed to a template.

use crate::error::Result;
use deepthink_core::{FocusArea, Iteration, Session, SubjectId};
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;

pub const ANALYSIS_SYSTEM: &str =
    "You are a financial analyst providing detailed investment analysis.";
pub const SUMMARY_SYSTEM: &str =
    "You are a financial advisor creating comprehensive investment summaries.";
pub const ADVICE_SYSTEM: &str = "You are a financial research planner determining the next focus area for investment analysis.";

const FINANCIAL: &str = r"You are analyzing the financial performance of {{ symbol }}.

Using the data below, assess:
1. Price performance over the available periods and how consistent it has been
2. Trading activity and what volume suggests about investor interest
3. What the figures imply about the underlying business trajectory
4. The most important strengths and weaknesses visible in the numbers

Present your key findings as a bulleted list, then give an overall assessment.
If the data is insufficient to support a conclusion, say so explicitly.

DATA:
{{ data }}
";

const COMPETITIVE: &str = r"You are evaluating the competitive position of {{ symbol }}.

Using the data below, assess:
1. How {{ symbol }} has performed relative to the broader market
2. Its sensitivity to market moves (beta, correlation) and what that says about its positioning
3. Likely competitive advantages or disadvantages consistent with this behaviour
4. Industry dynamics that could change its relative standing

Present your key findings as a bulleted list, then give an overall assessment.
If the data is insufficient to support a conclusion, say so explicitly.

DATA:
{{ data }}
";

const GROWTH: &str = r"You are assessing the growth prospects of {{ symbol }}.

Using the data below, assess:
1. Momentum across short and long horizons
2. Trend structure relative to the 50 and 200 day moving averages
3. Whether trading activity supports the current trend
4. Opportunities and catalysts that could extend or reverse it

Present your key findings as a bulleted list, then give an overall assessment.
If the data is insufficient to support a conclusion, say so explicitly.

DATA:
{{ data }}
";

const RISK: &str = r"You are performing a risk assessment of {{ symbol }}.

Using the data below, assess:
1. Volatility and downside deviation, and how they compare with typical equities
2. Drawdown history and the severity of the worst sessions
3. Market sensitivity and exposure to broad sell-offs
4. The key risks an investor should monitor

Present your key findings as a bulleted list, then give an overall assessment.
If the data is insufficient to support a conclusion, say so explicitly.

DATA:
{{ data }}
";

const GENERIC: &str = r"You are researching {{ symbol }} with a focus on {{ focus_title }}.

Focus: {{ focus_description }}

Analyze the data below from that perspective. Present your key findings as a
bulleted list, then give an overall assessment. If the data is insufficient to
support a conclusion, say so explicitly.

DATA:
{{ data }}
";

const SUMMARY: &str = r"You are a financial advisor tasked with creating a comprehensive investment summary for {{ symbol }}. Based on the following analyses, create a well-structured investment recommendation in Markdown format.

Your summary should include:
1. Executive Summary: a clear recommendation (Buy/Hold/Sell), the key investment thesis and a price target or expected return if supported
2. Company Overview: what the business does and where it stands
3. Financial Analysis: the most relevant financial findings
4. Growth Prospects: opportunities and catalysts
5. Competitive Advantages: position relative to peers and the market
6. Risk Factors: the key risks and how they could affect the thesis
7. Valuation: whether the current price looks attractive
8. Investment Recommendation: the final recommendation with rationale, time horizon and the metrics to monitor

Use proper Markdown formatting with headers, bullet points and emphasis where appropriate.
Be balanced and acknowledge both the strengths and the weaknesses of the investment case.
Base your recommendation strictly on the information provided in the analyses.

ANALYSES:
{% for analysis in analyses %}

## Analysis {{ analysis.number }}: {{ analysis.title }}
{% if analysis.narrative %}

Key Insights:
{{ analysis.narrative }}
{% endif %}
{% if analysis.key_points %}

Key Points:
{% for point in analysis.key_points %}
- {{ point }}
{% endfor %}
{% endif %}

Sentiment: {{ analysis.sentiment }}
Confidence: {{ analysis.confidence }}

--------------------------------------------------
{% endfor %}
";

const NEXT_FOCUS: &str = r"Based on the current investment analysis for {{ symbol }}, I need to determine which area requires further research.

Focus areas already covered:
{% for title in covered %}
- {{ title }}
{% else %}
- none yet
{% endfor %}

Most recent key points:
{% for point in key_points %}
- {{ point }}
{% else %}
- none recorded
{% endfor %}

Available focus areas:
{% for area in candidates %}
- {{ area.name }}: {{ area.description }}
{% endfor %}

Which ONE of these focus areas should be prioritized for the next research iteration? Respond with just the focus area name.
";

/// One analysis as presented to the summary template
#[derive(Debug, Serialize)]
struct AnalysisView<'a> {
    number: usize,
    title: String,
    narrative: &'a str,
    key_points: &'a [String],
    sentiment: String,
    confidence: String,
}

#[derive(Debug, Serialize)]
struct CandidateView<'a> {
    name: &'a str,
    description: &'a str,
}

/// Compiled prompt templates
pub struct PromptLibrary {
    env: Environment<'static>,
}

impl PromptLibrary {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        env.add_template("financial", FINANCIAL)?;
        env.add_template("competitive", COMPETITIVE)?;
        env.add_template("growth", GROWTH)?;
        env.add_template("risk", RISK)?;
        env.add_template("generic", GENERIC)?;
        env.add_template("summary", SUMMARY)?;
        env.add_template("next_focus", NEXT_FOCUS)?;

        Ok(Self { env })
    }

    /// Analysis prompt for one focus area
    pub fn analysis(&self, subject: &SubjectId, focus: &FocusArea, data: &Value) -> Result<String> {
        let name = match focus {
            FocusArea::FinancialPerformance => "financial",
            FocusArea::CompetitiveAnalysis => "competitive",
            FocusArea::GrowthProspects => "growth",
            FocusArea::RiskAssessment => "risk",
            FocusArea::Valuation | FocusArea::Custom(_) => "generic",
        };

        let rendered = self.env.get_template(name)?.render(context! {
            symbol => subject.as_str(),
            focus_title => focus.title(),
            focus_description => focus.description(),
            data => format_data(data),
        })?;
        Ok(rendered)
    }

    /// Summary prompt over the usable analyses of a session
    pub fn summary(&self, subject: &SubjectId, iterations: &[&Iteration]) -> Result<String> {
        let analyses: Vec<AnalysisView<'_>> = iterations
            .iter()
            .enumerate()
            .map(|(i, it)| AnalysisView {
                number: i + 1,
                title: it.focus.title(),
                narrative: &it.analysis_record.narrative,
                key_points: &it.analysis_record.insights,
                sentiment: it.analysis_record.sentiment.to_string(),
                confidence: format!("{:.2}", it.analysis_record.confidence),
            })
            .collect();

        let rendered = self.env.get_template("summary")?.render(context! {
            symbol => subject.as_str(),
            analyses => analyses,
        })?;
        Ok(rendered)
    }

    /// Prompt asking which focus area to research next
    pub fn next_focus(&self, session: &Session, candidates: &[FocusArea]) -> Result<String> {
        let covered: Vec<String> = session
            .focus_state
            .completed_focuses
            .iter()
            .map(FocusArea::title)
            .collect();
        let key_points: &[String] = session
            .latest_iteration()
            .map(|it| it.analysis_record.insights.as_slice())
            .unwrap_or_default();
        let candidates: Vec<CandidateView<'_>> = candidates
            .iter()
            .map(|focus| CandidateView {
                name: focus.as_str(),
                description: focus.description(),
            })
            .collect();

        let rendered = self.env.get_template("next_focus")?.render(context! {
            symbol => session.subject_id.as_str(),
            covered => covered,
            key_points => key_points,
            candidates => candidates,
        })?;
        Ok(rendered)
    }
}

impl std::fmt::Debug for PromptLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptLibrary")
            .field(
                "templates",
                &self.env.templates().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Flatten fetched data into prompt text
///
/// Nested objects and arrays become `## Title` sections, scalars become
/// `key: value` lines.
pub fn format_data(data: &Value) -> String {
    let Value::Object(fields) = data else {
        return scalar(data);
    };

    let mut out = String::new();
    for (key, value) in fields {
        match value {
            Value::Object(inner) => {
                out.push_str(&format!("\n## {}\n", title_case(key)));
                for (sub_key, sub_value) in inner {
                    out.push_str(&format!("{sub_key}: {}\n", scalar(sub_value)));
                }
            }
            Value::Array(items) => {
                out.push_str(&format!("\n## {}\n", title_case(key)));
                for item in items {
                    if let Value::Object(entry) = item {
                        out.push('\n');
                        for (item_key, item_value) in entry {
                            out.push_str(&format!("{item_key}: {}\n", scalar(item_value)));
                        }
                    } else {
                        out.push_str(&format!("- {}\n", scalar(item)));
                    }
                }
            }
            _ => out.push_str(&format!("{key}: {}\n", scalar(value))),
        }
    }
    out
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => "n/a".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
