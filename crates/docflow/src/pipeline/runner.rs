use std::sync::Arc;

use tracing::{debug, info_span};

use crate::error::ProcessError;
use crate::processor::{Classifier, DocumentParser, DocumentValidator, NoopValidator};
use crate::worker::job::{ItemProcessor, ProcessedItem, WorkItem};

/// Stock item processor: parse, validate, then classify when a classifier is
/// configured. The first failing step fails the item.
pub struct Pipeline {
    parser: Arc<dyn DocumentParser>,
    validator: Arc<dyn DocumentValidator>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl Pipeline {
    pub fn new(parser: Arc<dyn DocumentParser>, validator: Arc<dyn DocumentValidator>) -> Self {
        Self {
            parser,
            validator,
            classifier: None,
        }
    }

    /// Pipeline that only parses.
    pub fn parse_only(parser: Arc<dyn DocumentParser>) -> Self {
        Self::new(parser, Arc::new(NoopValidator))
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn run(&self, item: &WorkItem) -> Result<ProcessedItem, ProcessError> {
        let _pipeline_span = info_span!("pipeline",
            index = item.index,
            filename = %item.name,
        )
        .entered();

        let document = {
            let _step = info_span!("parse").entered();
            self.parser.parse(&item.name, &item.payload)?
        };

        let issues = {
            let _step = info_span!("validate").entered();
            self.validator.validate(&document)?
        };

        let classification = match &self.classifier {
            Some(classifier) => {
                let _step = info_span!("classify").entered();
                classifier.classify(&document)?
            }
            None => None,
        };

        debug!(issues = issues.len(), "Processed {}", item.name);

        Ok(ProcessedItem {
            document,
            issues,
            classification,
        })
    }
}

impl ItemProcessor for Pipeline {
    fn process(&self, item: &WorkItem) -> Result<ProcessedItem, ProcessError> {
        self.run(item)
    }
}
