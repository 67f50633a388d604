use engine_config::settings::validated::AreaPrefixes;
use model::core::kind::FileKind;

/// Channel directory used for quarantined files whose kind is unknown.
pub const UNCLASSIFIED_DIR: &str = "unclassified";
pub const SIDECAR_SUFFIX: &str = ".errors.json";
pub const DEFAULT_PARTITION: &str = "default";

/// Maps raw object keys to their clean or quarantine destinations.
///
/// `raw/customer_feedback/eu/f.csv` goes to
/// `validated/customer_feedback/eu/f.csv` or `error/customer_feedback/eu/f.csv`;
/// the path below the channel directory is kept as is.
#[derive(Debug, Clone)]
pub struct AreaLayout {
    prefixes: AreaPrefixes,
}

impl AreaLayout {
    pub fn new(prefixes: AreaPrefixes) -> Self {
        Self { prefixes }
    }

    /// Listing prefix of the landing area, with trailing slash.
    pub fn raw_prefix(&self) -> String {
        format!("{}/", self.prefixes.raw)
    }

    pub fn clean_prefix(&self) -> String {
        format!("{}/", self.prefixes.clean)
    }

    pub fn quarantine_prefix(&self) -> String {
        format!("{}/", self.prefixes.quarantine)
    }

    /// Path below the channel directory, or below the raw prefix when the
    /// file did not arrive through a known channel.
    fn relative<'a>(&self, location: &'a str) -> &'a str {
        let rest = location
            .strip_prefix(self.prefixes.raw.as_str())
            .and_then(|r| r.strip_prefix('/'))
            .unwrap_or(location);

        match rest.split_once('/') {
            Some((dir, below)) if FileKind::from_channel_dir(dir).is_some() => below,
            _ => rest,
        }
    }

    pub fn destination(&self, location: &str, kind: Option<FileKind>, valid: bool) -> String {
        let area = if valid {
            &self.prefixes.clean
        } else {
            &self.prefixes.quarantine
        };
        let dir = kind.map(|k| k.channel_dir()).unwrap_or(UNCLASSIFIED_DIR);
        format!("{area}/{dir}/{}", self.relative(location))
    }

    pub fn sidecar(destination: &str) -> String {
        format!("{destination}{SIDECAR_SUFFIX}")
    }

    /// Partition key: the directory between the channel directory and the
    /// file name, e.g. `eu` for `validated/customer_feedback/eu/f.csv`.
    pub fn partition(&self, location: &str) -> String {
        let rest = [&self.prefixes.clean, &self.prefixes.raw]
            .iter()
            .find_map(|p| location.strip_prefix(p.as_str())?.strip_prefix('/'))
            .unwrap_or(location);

        let mut parts = rest.split('/');
        let first = parts.next();
        let below: Vec<&str> = match first {
            Some(dir) if FileKind::from_channel_dir(dir).is_some() => parts.collect(),
            _ => return DEFAULT_PARTITION.to_string(),
        };

        match below.as_slice() {
            [] | [_] => DEFAULT_PARTITION.to_string(),
            [dirs @ .., _file] => dirs.join("/"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> AreaLayout {
        AreaLayout::new(AreaPrefixes {
            raw: "raw".into(),
            clean: "validated".into(),
            quarantine: "error".into(),
        })
    }

    #[test]
    fn keeps_the_path_below_the_channel() {
        let l = layout();
        assert_eq!(
            l.destination("raw/customer_feedback/eu/f.csv", Some(FileKind::Feedback), true),
            "validated/customer_feedback/eu/f.csv"
        );
        assert_eq!(
            l.destination("raw/customer_details/p.xml", Some(FileKind::Profile), false),
            "error/customer_details/p.xml"
        );
    }

    #[test]
    fn files_outside_a_channel_use_the_detected_kind() {
        let l = layout();
        assert_eq!(
            l.destination("raw/drop/orders.json", Some(FileKind::Purchase), true),
            "validated/customer_purchases/drop/orders.json"
        );
        assert_eq!(
            l.destination("raw/blob.bin", None, false),
            "error/unclassified/blob.bin"
        );
        assert_eq!(
            AreaLayout::sidecar("error/unclassified/blob.bin"),
            "error/unclassified/blob.bin.errors.json"
        );
    }

    #[test]
    fn partition_is_the_directory_below_the_channel() {
        let l = layout();
        assert_eq!(l.partition("validated/customer_feedback/eu/f.csv"), "eu");
        assert_eq!(l.partition("validated/customer_feedback/eu/2024/f.csv"), "eu/2024");
        assert_eq!(l.partition("validated/customer_details/p.xml"), "default");
        assert_eq!(l.partition("raw/customer_details/us/p.xml"), "us");
        assert_eq!(l.partition("elsewhere/p.xml"), "default");
    }
}
