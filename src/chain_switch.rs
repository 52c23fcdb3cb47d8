//! Network switching with live verification.
//!
//! Wallet providers acknowledge a switch request before the switch has
//! actually landed, and UI-facing state lags further still. The controller
//! therefore trusts only [`WalletProvider::live_network_id`], re-verifying
//! after every request until the provider reports the target network.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::wallet::WalletProvider;

/// Delays and bounds for one switch procedure. Tests inject zeroed timings;
/// production uses [`SwitchTiming::default`].
#[derive(Debug, Clone)]
pub struct SwitchTiming {
    /// Pause after a switch request before the first verification.
    pub settle: Duration,
    /// Pause between verification probes.
    pub verify_interval: Duration,
    /// Verification probes per switch request.
    pub verify_attempts: u32,
    /// Pause between full switch attempts.
    pub retry_backoff: Duration,
}

impl Default for SwitchTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            verify_interval: Duration::from_secs(1),
            verify_attempts: 5,
            retry_backoff: Duration::from_millis(1500),
        }
    }
}

/// Ensures the wallet sits on a required network before an operation runs.
#[derive(Debug, Clone, Default)]
pub struct ChainSwitchController {
    timing: SwitchTiming,
}

impl ChainSwitchController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timing(timing: SwitchTiming) -> Self {
        Self { timing }
    }

    /// Drives the wallet onto `target_network_id`, retrying the whole switch
    /// procedure up to `max_retries` times.
    ///
    /// Returns `false` — never an error — when the switch cannot be made:
    /// on exhaustion, or immediately on user rejection (a rejected prompt
    /// must not be re-raised). A `false` means the calling route cannot
    /// proceed.
    pub async fn ensure_correct_chain<W>(
        &self,
        wallet: &W,
        target_network_id: u64,
        max_retries: u32,
    ) -> bool
    where
        W: WalletProvider + ?Sized,
    {
        if self.on_target(wallet, target_network_id).await {
            debug!(target_network_id, "Already on target network");
            return true;
        }

        for attempt in 1..=max_retries {
            debug!(
                target_network_id,
                attempt, max_retries, "Requesting network switch"
            );

            if let Err(error) = wallet.request_network_switch(target_network_id).await {
                if error.is_user_rejection() {
                    info!(target_network_id, "User rejected network switch");
                    return false;
                }

                warn!(target_network_id, attempt, %error, "Network switch request failed");
                if attempt == max_retries {
                    return false;
                }
                tokio::time::sleep(self.timing.retry_backoff).await;
                continue;
            }

            tokio::time::sleep(self.timing.settle).await;

            for _ in 0..self.timing.verify_attempts {
                if self.on_target(wallet, target_network_id).await {
                    info!(target_network_id, attempt, "Network switch verified");
                    return true;
                }
                tokio::time::sleep(self.timing.verify_interval).await;
            }

            warn!(
                target_network_id,
                attempt, "Network switch did not verify; retrying"
            );
        }

        false
    }

    /// Live comparison against the provider. Query errors count as a
    /// mismatch so a flaky provider falls into the retry path instead of
    /// aborting the procedure.
    async fn on_target<W>(&self, wallet: &W, target_network_id: u64) -> bool
    where
        W: WalletProvider + ?Sized,
    {
        match wallet.live_network_id().await {
            Ok(network_id) => network_id == target_network_id,
            Err(error) => {
                debug!(%error, "Live network query failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedWallet;

    fn instant_timing() -> SwitchTiming {
        SwitchTiming {
            settle: Duration::ZERO,
            verify_interval: Duration::ZERO,
            verify_attempts: 5,
            retry_backoff: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn already_correct_network_is_a_free_no_op() {
        let wallet = ScriptedWallet::on_network(10);
        let controller = ChainSwitchController::with_timing(instant_timing());

        assert!(controller.ensure_correct_chain(&wallet, 10, 3).await);
        assert_eq!(wallet.switch_requests(), 0);
    }

    #[tokio::test]
    async fn switches_and_verifies_against_live_provider() {
        let wallet = ScriptedWallet::on_network(1);
        wallet.switch_lands_on(10);
        let controller = ChainSwitchController::with_timing(instant_timing());

        assert!(controller.ensure_correct_chain(&wallet, 10, 3).await);
        assert_eq!(wallet.switch_requests(), 1);
    }

    #[tokio::test]
    async fn user_rejection_is_terminal_without_further_retries() {
        let wallet = ScriptedWallet::on_network(1);
        wallet.reject_switches();
        let controller = ChainSwitchController::with_timing(instant_timing());

        assert!(!controller.ensure_correct_chain(&wallet, 10, 5).await);
        assert_eq!(wallet.switch_requests(), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_when_switch_never_lands() {
        let wallet = ScriptedWallet::on_network(1);
        // Requests succeed but the provider never actually moves.
        let controller = ChainSwitchController::with_timing(instant_timing());

        assert!(!controller.ensure_correct_chain(&wallet, 10, 3).await);
        assert_eq!(wallet.switch_requests(), 3);
    }

    #[tokio::test]
    async fn provider_errors_fall_into_retry_path() {
        let wallet = ScriptedWallet::on_network(1);
        wallet.fail_switches_with_provider_error(2);
        wallet.switch_lands_on(10);
        let controller = ChainSwitchController::with_timing(instant_timing());

        assert!(controller.ensure_correct_chain(&wallet, 10, 3).await);
        assert_eq!(wallet.switch_requests(), 3);
    }
}
