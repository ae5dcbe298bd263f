use std::fmt::Write;

use crate::model::Opportunity;

/// Markdown report for download, one numbered section per opportunity.
pub fn render_report(url: &str, opportunities: &[Opportunity]) -> String {
    let mut out = format!("# AI Opportunity Report for {url}\n\n");
    out.push_str("Generated by E-commerce AI Auditor\n---\n\n");

    for (i, opp) in opportunities.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "## {}. {}\n\
             **ROI:** {}/10 | **Complexity:** {}\n\n\
             {}\n\n\
             **Tools:** {}\n\n---\n",
            i + 1,
            opp.title,
            opp.roi,
            opp.complexity,
            opp.description,
            opp.tools.join(", "),
        );
    }
    out
}

/// `AI_Audit_<unix seconds>.md`
pub fn report_file_name(unix_secs: u64) -> String {
    format!("AI_Audit_{unix_secs}.md")
}
