//! Well-known names, labels, and defaults.

use std::time::Duration;

/// Label on a primary service listing its sidekicks, comma-separated.
pub const SIDEKICKS_LABEL: &str = "io.rancher.sidekicks";

/// Image repository that marks a load-balancer service.
pub const LOAD_BALANCER_IMAGE: &str = "rancher/load-balancer-service";

/// Image repository that marks a DNS service.
pub const DNS_SERVICE_IMAGE: &str = "rancher/dns-service";

/// Image repository that marks an external service.
pub const EXTERNAL_SERVICE_IMAGE: &str = "rancher/external-service";

/// Prefix prepended to image references in launch configs.
pub const IMAGE_UUID_PREFIX: &str = "docker:";

/// Protocol appended to port specs that do not name one.
pub const DEFAULT_PORT_PROTOCOL: &str = "tcp";

/// Manifest file read when `-f` is not given.
pub const DEFAULT_MANIFEST_FILE: &str = "docker-compose.yml";

/// Overlay file looked up beside the manifest.
pub const DEFAULT_OVERLAY_FILE: &str = "rancher-compose.yml";

/// Manifest path meaning "read from standard input".
pub const STDIN_MANIFEST: &str = "-";

/// Default base URL of the orchestration API.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/v1";

/// Default per-call timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the API base URL.
pub const ENV_URL: &str = "RANCHER_URL";

/// Environment variable holding the API access key.
pub const ENV_ACCESS_KEY: &str = "RANCHER_ACCESS_KEY";

/// Environment variable holding the API secret key.
pub const ENV_SECRET_KEY: &str = "RANCHER_SECRET_KEY";

/// Environment variable overriding the per-call timeout, in seconds.
pub const ENV_TIMEOUT_SECS: &str = "CORRAL_TIMEOUT_SECS";

/// Application name used in CLI output.
pub const APP_NAME: &str = "corral";
