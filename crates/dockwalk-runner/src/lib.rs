pub mod archive;
pub mod docker;
pub mod executor;
pub mod git;
pub mod process;
pub mod publish;

pub use archive::archive_file_name;
pub use docker::{ArchiveError, ArchiveReport, BuildError, DockerClient};
pub use executor::{CommandExecutor, Invocation, OutputFilter, RealExecutor};
pub use git::{GitClient, VersionQueryError};
pub use process::ProcessError;
pub use publish::{PublishError, PublishReport, RegistryCredentials, publish};
