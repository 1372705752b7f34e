//! Static module catalog: titles, study-material references, and question
//! banks, loaded once at startup.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use drill_core::model::{
    AnswerKey, Difficulty, ModuleEntry, ModuleNumber, Question, QuestionBank,
};

use crate::error::CatalogError;

/// One module of the catalog: its entry plus the question bank backing its
/// quiz.
#[derive(Debug, Clone)]
pub struct CatalogModule {
    entry: ModuleEntry,
    bank: QuestionBank,
}

impl CatalogModule {
    #[must_use]
    pub fn new(entry: ModuleEntry, bank: QuestionBank) -> Self {
        Self { entry, bank }
    }

    #[must_use]
    pub fn entry(&self) -> &ModuleEntry {
        &self.entry
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }
}

/// Read-only module catalog, ordered by module number.
///
/// Everything module-specific (title, material, questions) lives here, so
/// one quiz/progress code path serves every module instead of near-duplicate
/// state machines per module.
#[derive(Debug, Clone)]
pub struct ModuleCatalog {
    modules: Vec<CatalogModule>,
}

impl ModuleCatalog {
    /// Build a catalog, requiring module numbers to run 1..N without gaps so
    /// "unlock the successor" is always `number + 1`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Empty` or `CatalogError::NonContiguous`.
    pub fn new(mut modules: Vec<CatalogModule>) -> Result<Self, CatalogError> {
        if modules.is_empty() {
            return Err(CatalogError::Empty);
        }
        modules.sort_by_key(|m| m.entry.number());
        for (i, module) in modules.iter().enumerate() {
            let expected = i as u32 + 1;
            let found = module.entry.number().value();
            if found != expected {
                return Err(CatalogError::NonContiguous { expected, found });
            }
        }
        Ok(Self { modules })
    }

    /// Load every `*.json` bank file from a directory.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on unreadable files, malformed JSON, or an
    /// invalid resulting catalog.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let mut modules = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read_to_string(&path)?;
            let file: BankFile =
                serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                    path: path.clone(),
                    source,
                })?;
            modules.push(file.into_module(&path)?);
        }
        Self::new(modules)
    }

    #[must_use]
    pub fn total_modules(&self) -> u32 {
        self.modules.len() as u32
    }

    #[must_use]
    pub fn get(&self, module: ModuleNumber) -> Option<&CatalogModule> {
        let index = module.value().checked_sub(1)? as usize;
        self.modules.get(index)
    }

    #[must_use]
    pub fn bank(&self, module: ModuleNumber) -> Option<&QuestionBank> {
        self.get(module).map(CatalogModule::bank)
    }

    #[must_use]
    pub fn title(&self, module: ModuleNumber) -> Option<&str> {
        self.get(module).map(|m| m.entry().title())
    }

    /// Catalog entries for seeding the modules table.
    #[must_use]
    pub fn entries(&self) -> Vec<ModuleEntry> {
        self.modules.iter().map(|m| m.entry.clone()).collect()
    }
}

// ─── Bank file format ──────────────────────────────────────────────────────

/// On-disk shape of one module's bank file, mirroring the question records
/// the study material ships with.
#[derive(Debug, Deserialize)]
struct BankFile {
    module: u32,
    title: String,
    #[serde(default)]
    content_reference: Option<String>,
    questions: Vec<BankFileQuestion>,
}

#[derive(Debug, Deserialize)]
struct BankFileQuestion {
    question: String,
    options: Vec<String>,
    answer: String,
    difficulty: String,
    category: String,
}

impl BankFile {
    fn into_module(self, path: &Path) -> Result<CatalogModule, CatalogError> {
        let number = ModuleNumber::new(self.module);
        let content_reference = self
            .content_reference
            .unwrap_or_else(|| format!("study_materials/module_{}.pdf", self.module));
        let entry = ModuleEntry::new(number, self.title, content_reference)?;

        let mut questions = Vec::with_capacity(self.questions.len());
        for (index, q) in self.questions.into_iter().enumerate() {
            let options: [String; 4] =
                q.options
                    .try_into()
                    .map_err(|bad: Vec<String>| CatalogError::WrongOptionCount {
                        path: path.to_path_buf(),
                        index,
                        got: bad.len(),
                    })?;
            questions.push(Question::new(
                q.question,
                options,
                q.answer.parse::<AnswerKey>()?,
                q.difficulty.parse::<Difficulty>()?,
                q.category,
            )?);
        }

        Ok(CatalogModule::new(entry, QuestionBank::new(questions)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn bank_json(module: u32, questions: usize) -> String {
        let mut qs = Vec::new();
        for i in 0..questions {
            qs.push(format!(
                r#"{{
                    "question": "Module {module} question {i}?",
                    "options": ["A. first", "B. second", "C. third", "D. fourth"],
                    "answer": "D",
                    "difficulty": "Medium",
                    "category": "General"
                }}"#
            ));
        }
        format!(
            r#"{{
                "module": {module},
                "title": "Module {module}",
                "questions": [{}]
            }}"#,
            qs.join(",")
        )
    }

    #[test]
    fn loads_banks_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        for module in 1..=2 {
            let mut file =
                std::fs::File::create(dir.path().join(format!("module_{module}.json"))).unwrap();
            file.write_all(bank_json(module, 3).as_bytes()).unwrap();
        }

        let catalog = ModuleCatalog::from_dir(dir.path()).unwrap();
        assert_eq!(catalog.total_modules(), 2);
        assert_eq!(catalog.title(ModuleNumber::new(1)), Some("Module 1"));
        assert_eq!(catalog.bank(ModuleNumber::new(2)).unwrap().len(), 3);
        assert_eq!(
            catalog.entries()[0].content_reference(),
            "study_materials/module_1.pdf"
        );
    }

    #[test]
    fn rejects_gap_in_module_numbers() {
        let dir = tempfile::tempdir().unwrap();
        for module in [1, 3] {
            let mut file =
                std::fs::File::create(dir.path().join(format!("module_{module}.json"))).unwrap();
            file.write_all(bank_json(module, 1).as_bytes()).unwrap();
        }

        let err = ModuleCatalog::from_dir(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::NonContiguous {
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn rejects_wrong_option_count() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{
            "module": 1,
            "title": "Module 1",
            "questions": [{
                "question": "Only two options?",
                "options": ["A. yes", "B. no"],
                "answer": "A",
                "difficulty": "Easy",
                "category": "General"
            }]
        }"#;
        std::fs::write(dir.path().join("module_1.json"), json).unwrap();

        let err = ModuleCatalog::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, CatalogError::WrongOptionCount { got: 2, .. }));
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert!(matches!(
            ModuleCatalog::new(Vec::new()),
            Err(CatalogError::Empty)
        ));
    }

    #[test]
    fn lookup_out_of_range_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("module_1.json"), bank_json(1, 1)).unwrap();
        let catalog = ModuleCatalog::from_dir(dir.path()).unwrap();

        assert!(catalog.get(ModuleNumber::new(0)).is_none());
        assert!(catalog.get(ModuleNumber::new(2)).is_none());
    }
}
