//! Rice Leaf Dataset Loader
//!
//! Handles discovering a folder-per-class image dataset on disk and deriving the label set
//! from its directory names.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::LabelSet;

/// Image file extensions picked up by the loader
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A single image sample with its label and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class name (directory name, e.g. "Brownspot")
    pub class_name: String,
    /// Unique sample ID
    pub id: usize,
}

/// Folder-per-class rice leaf dataset with lazy image loading
#[derive(Debug)]
pub struct RiceLeafDataset {
    /// Root directory of the dataset
    pub root_dir: PathBuf,
    /// All samples in the dataset
    pub samples: Vec<ImageSample>,
    /// Labels in index order (sorted directory names)
    pub labels: LabelSet,
}

impl RiceLeafDataset {
    /// Create a new dataset from a directory
    ///
    /// The directory should be structured as:
    /// ```text
    /// root_dir/
    /// ├── Bacterialblight/
    /// │   ├── image1.jpg
    /// │   └── image2.jpg
    /// ├── Blast/
    /// │   └── ...
    /// └── ...
    /// ```
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading rice leaf dataset from: {:?}", root_dir);

        if !root_dir.exists() {
            anyhow::bail!("Dataset directory does not exist: {:?}", root_dir);
        }

        let mut class_dirs: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_dirs.push(name.to_string());
                }
            }
        }
        class_dirs.sort();

        info!("Found {} classes", class_dirs.len());

        let mut samples = Vec::new();
        let mut sample_id: usize = 0;

        for (label, class_name) in class_dirs.iter().enumerate() {
            let class_dir = root_dir.join(class_name);

            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.path().to_path_buf())
                .filter(|p| is_image_file(p))
                .collect();
            // Directory iteration order is platform dependent
            paths.sort();

            debug!(
                "Class '{}' (label {}): {} samples",
                class_name,
                label,
                paths.len()
            );

            for path in paths {
                samples.push(ImageSample {
                    path,
                    label,
                    class_name: class_name.clone(),
                    id: sample_id,
                });
                sample_id += 1;
            }
        }

        info!("Loaded {} total samples", samples.len());

        Ok(Self {
            root_dir,
            samples,
            labels: LabelSet::new(class_dirs),
        })
    }

    /// Get the number of samples in the dataset
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the number of classes
    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    /// Get statistics about the dataset
    pub fn get_stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self
                .labels
                .iter()
                .enumerate()
                .map(|(idx, name)| (idx, name.to_string()))
                .collect(),
        }
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Statistics about the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: HashMap<usize, String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\n📊 Dataset Statistics:");
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!("\n  Samples per class:");

        let mut sorted: Vec<_> = self.class_names.iter().collect();
        sorted.sort_by_key(|(idx, _)| *idx);

        for (idx, name) in sorted {
            let count = self.class_counts[*idx];
            let bar_len = (count as f32 / self.total_samples.max(1) as f32 * 40.0) as usize;
            let bar: String = "█".repeat(bar_len);
            println!("    {:3}. {:25} {:5} {}", idx, name, count, bar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, b"not really an image").unwrap();
    }

    #[test]
    fn test_loads_sorted_classes_and_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for class in ["Tungro", "Blast", "Healthy"] {
            std::fs::create_dir(dir.path().join(class)).unwrap();
        }
        touch(&dir.path().join("Blast/a.jpg"));
        touch(&dir.path().join("Blast/b.PNG"));
        touch(&dir.path().join("Blast/notes.txt"));
        touch(&dir.path().join("Healthy/c.jpeg"));
        touch(&dir.path().join("Tungro/d.bmp"));

        let dataset = RiceLeafDataset::new(dir.path()).unwrap();

        assert_eq!(dataset.labels, LabelSet::new(["Blast", "Healthy", "Tungro"]));
        assert_eq!(dataset.len(), 4);

        let stats = dataset.get_stats();
        assert_eq!(stats.class_counts, vec![2, 1, 1]);
        assert_eq!(stats.class_names[&2], "Tungro");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(RiceLeafDataset::new("/definitely/not/here").is_err());
    }
}
