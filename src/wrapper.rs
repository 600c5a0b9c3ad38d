// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

use crate::paths::WRAPPER_PROPERTIES;
use crate::properties::Properties;

const DEFAULT_DISTRIBUTION_PATH: &str = "wrapper/dists";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionBase {
    GradleUserHome,
    Project,
    Path(PathBuf),
}

impl DistributionBase {
    fn parse(value: &str) -> Self {
        match value {
            "GRADLE_USER_HOME" => DistributionBase::GradleUserHome,
            "PROJECT" => DistributionBase::Project,
            other => DistributionBase::Path(PathBuf::from(other)),
        }
    }
}

/// The distribution pinned by `gradle/wrapper/gradle-wrapper.properties`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperDistribution {
    pub base: DistributionBase,
    pub path: String,
    pub url: String,
}

impl WrapperDistribution {
    /// Reads the descriptor of the project at `project_dir`. `Ok(None)` means
    /// the project has no wrapper descriptor at all.
    pub fn load(project_dir: &Path) -> Result<Option<Self>> {
        let file = project_dir.join(WRAPPER_PROPERTIES);
        if !file.is_file() {
            return Ok(None);
        }
        let props = Properties::load(&file)?;
        Self::from_properties(&props)
            .map(Some)
            .map_err(|e| anyhow!("{}: {e}", file.display()))
    }

    pub fn from_properties(props: &Properties) -> Result<Self> {
        let url = props
            .get("distributionUrl")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow!("distributionUrl is not set"))?;
        Ok(Self {
            base: DistributionBase::parse(props.get("distributionBase").unwrap_or("GRADLE_USER_HOME")),
            path: props
                .get("distributionPath")
                .unwrap_or(DEFAULT_DISTRIBUTION_PATH)
                .to_string(),
            url: url.trim().to_string(),
        })
    }

    /// Last segment of the URL without `.zip`, e.g. `gradle-7.4-bin`. This is
    /// the directory name the wrapper unpacks into.
    pub fn distribution_name(&self) -> &str {
        let name = self.url.rsplit('/').next().unwrap_or(&self.url);
        name.strip_suffix(".zip").unwrap_or(name)
    }

    /// Gradle version of the distribution, e.g. `7.4`. Matches the names of
    /// the per-version directories under `caches/`.
    pub fn distribution_version(&self) -> &str {
        let name = self.distribution_name();
        let version = name.strip_prefix("gradle-").unwrap_or(name);
        version
            .strip_suffix("-bin")
            .or_else(|| version.strip_suffix("-all"))
            .unwrap_or(version)
    }

    /// Directory holding all unpacked distributions.
    pub fn distributions_dir(&self, gradle_user_home: &Path, project_dir: &Path) -> PathBuf {
        let base = match &self.base {
            DistributionBase::GradleUserHome => gradle_user_home.to_path_buf(),
            DistributionBase::Project => project_dir.to_path_buf(),
            DistributionBase::Path(path) => path.clone(),
        };
        base.join(&self.path)
    }
}
