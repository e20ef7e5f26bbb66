use crate::model::Framework;
use crate::extractor::ExtractorRegistry;
use crate::parser::SourceFile;
use log::debug;
use std::path::PathBuf;

/// Framework detector for identifying the web frameworks a project uses.
///
/// Detection asks every registered adapter to probe every file it can read
/// (import statements, `use` trees, package imports). A project may use several
/// frameworks at once, for example a Go service and a Python admin app side by
/// side.
pub struct FrameworkDetector;

/// Result of framework detection.
#[derive(Debug, Default)]
pub struct DetectionResult {
    /// Detected frameworks, in registry order
    pub frameworks: Vec<Framework>,
    /// Every file that matched, with the framework it matched
    pub matches: Vec<(PathBuf, Framework)>,
}

impl DetectionResult {
    pub fn contains(&self, framework: Framework) -> bool {
        self.frameworks.contains(&framework)
    }
}

impl FrameworkDetector {
    /// Detects which of the registry's frameworks appear in `files`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use routescope::detector::FrameworkDetector;
    /// use routescope::extractor::ExtractorRegistry;
    /// use routescope::parser::SourceParser;
    /// use std::path::Path;
    ///
    /// let parsed = SourceParser::parse_file(Path::new("src/main.rs")).unwrap();
    /// let result = FrameworkDetector::detect(&[parsed], &ExtractorRegistry::with_all());
    /// println!("Detected {} framework(s)", result.frameworks.len());
    /// ```
    pub fn detect(files: &[SourceFile], registry: &ExtractorRegistry) -> DetectionResult {
        debug!("Detecting frameworks in {} files", files.len());

        let mut result = DetectionResult::default();
        for extractor in registry.iter() {
            for file in files
                .iter()
                .filter(|f| extractor.languages().contains(&f.language))
            {
                if extractor.probe(file) {
                    debug!("{} uses {:?}", file.path.display(), extractor.framework());
                    result.matches.push((file.path.clone(), extractor.framework()));
                    if !result.contains(extractor.framework()) {
                        result.frameworks.push(extractor.framework());
                    }
                }
            }
        }

        debug!("Detected frameworks: {:?}", result.frameworks);
        result
    }
}
