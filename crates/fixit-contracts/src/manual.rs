use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualQueryKind {
    PdfManual,
    SupportPage,
    RepairArticle,
    Video,
    DiscussionThread,
}

impl ManualQueryKind {
    /// Cascade order; the resolver stops at the first query that yields a pick.
    pub const CASCADE: [ManualQueryKind; 5] = [
        Self::PdfManual,
        Self::SupportPage,
        Self::RepairArticle,
        Self::Video,
        Self::DiscussionThread,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PdfManual => "pdf_manual",
            Self::SupportPage => "support_page",
            Self::RepairArticle => "repair_article",
            Self::Video => "video",
            Self::DiscussionThread => "discussion_thread",
        }
    }

    pub fn prefer_pdf(self) -> bool {
        matches!(self, Self::PdfManual)
    }

    fn prompt(self, object_name: &str) -> String {
        match self {
            Self::PdfManual => format!(
                "Find the official PDF repair or service manual for: {object_name}. \
Return the direct URL of the PDF file."
            ),
            Self::SupportPage => format!(
                "Find the official manufacturer support page for: {object_name}. \
Return the primary URL."
            ),
            Self::RepairArticle => format!(
                "Find a step-by-step repair guide article for: {object_name}. \
Return the URL of the guide."
            ),
            Self::Video => format!(
                "Find a repair video tutorial for: {object_name}. Return the video URL."
            ),
            Self::DiscussionThread => format!(
                "Find a forum or community discussion thread about repairing: {object_name}. \
Return the URL of the thread."
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualSearchQuery {
    pub kind: ManualQueryKind,
    pub prompt_text: String,
    pub prefer_pdf: bool,
}

pub fn manual_search_cascade(object_name: &str) -> Vec<ManualSearchQuery> {
    let name = object_name.trim();
    ManualQueryKind::CASCADE
        .into_iter()
        .map(|kind| ManualSearchQuery {
            kind,
            prompt_text: kind.prompt(name),
            prefer_pdf: kind.prefer_pdf(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_runs_pdf_first_then_broader_sources() {
        let queries = manual_search_cascade(" Bosch SMS6 dishwasher ");
        let kinds: Vec<&str> = queries.iter().map(|query| query.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "pdf_manual",
                "support_page",
                "repair_article",
                "video",
                "discussion_thread"
            ]
        );
        assert!(queries[0].prefer_pdf);
        assert!(queries[1..].iter().all(|query| !query.prefer_pdf));
        assert!(queries
            .iter()
            .all(|query| query.prompt_text.contains(": Bosch SMS6 dishwasher.")));
    }
}
