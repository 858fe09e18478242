use anyhow::Result;
use std::sync::Arc;

use super::Tool;
use crate::dataset::Dataset;
use crate::{report, router};

/// Answers free-text questions about the patient dataset.
pub struct YteTool {
    dataset: Arc<Dataset>,
}

impl YteTool {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }
}

#[async_trait::async_trait]
impl Tool for YteTool {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        "yte"
    }

    async fn run(&self, query: String) -> Result<String> {
        Ok(router::answer(&query, &self.dataset))
    }
}

/// Describes the loaded dataset and the supported query categories.
pub struct YteInfoTool {
    dataset: Arc<Dataset>,
}

impl YteInfoTool {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }
}

#[async_trait::async_trait]
impl Tool for YteInfoTool {
    type Input = ();
    type Output = String;

    fn name(&self) -> &str {
        "yte_info"
    }

    async fn run(&self, _input: ()) -> Result<String> {
        Ok(report::info(&self.dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::nine_patients;

    #[tokio::test]
    async fn test_yte_tool_answers_queries() {
        let tool = YteTool::new(Arc::new(nine_patients()));
        assert_eq!(tool.name(), "yte");

        let answer = tool.run("giới tính".to_string()).await.unwrap();
        assert!(answer.contains("Tỷ lệ Nam/Nữ: 2.0:1"));
    }

    #[tokio::test]
    async fn test_yte_tool_without_data() {
        let tool = YteTool::new(Arc::new(Dataset::default()));
        let answer = tool.run("tổng quan".to_string()).await.unwrap();
        assert_eq!(answer, report::NO_DATA);
    }

    #[tokio::test]
    async fn test_info_tool() {
        let tool = YteInfoTool::new(Arc::new(nine_patients()));
        assert_eq!(tool.name(), "yte_info");
        let info = tool.run(()).await.unwrap();
        assert!(info.contains("Số bệnh nhân: 9"));
    }
}
