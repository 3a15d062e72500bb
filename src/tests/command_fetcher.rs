// External credential command, driven through `sh -c`.

#[cfg(test)]
mod test {

    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use crate::cache::credential_cache::CredentialCache;
    use crate::errors::CredentialError;
    use crate::sources::command::CommandFetcher;
    use crate::sources::fetch::CredentialFetcher;
    use crate::tests::common::credential;

    fn shell(script: &str, timeout: Duration) -> CommandFetcher {
        CommandFetcher::new("sh", vec!["-c".to_owned(), script.to_owned()], timeout)
    }

    #[tokio::test]
    async fn returns_stdout_of_successful_command() {
        let fetcher = shell("echo 'login ok'; echo token-output", Duration::from_secs(5));

        let raw = fetcher.execute(&CancellationToken::new()).await.unwrap();

        assert_eq!(raw, b"login ok\ntoken-output\n");
    }

    #[tokio::test]
    async fn cache_extracts_credential_from_command_output() {
        let value = credential("cmd");
        let script = format!("echo 'notice: refreshing'; echo '{value}'; echo done >&2");
        let cache = CredentialCache::new(shell(&script, Duration::from_secs(5)), Duration::from_secs(60));

        let fetched = cache.get(&CancellationToken::new()).await.unwrap();

        assert_eq!(fetched.expose(), value);
    }

    #[tokio::test]
    async fn failing_command_does_not_leak_output() {
        let value = credential("secret");
        let script = format!("echo '{value}'; echo '{value}' >&2; exit 3");
        let fetcher = shell(&script, Duration::from_secs(5));

        let err = fetcher.execute(&CancellationToken::new()).await.unwrap_err();

        assert_eq!(err, CredentialError::Fetch("credential command exited with status 3".to_owned()));
        assert!(!err.to_string().contains(&value));
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let fetcher = CommandFetcher::new("/nonexistent/credential-helper", Vec::new(), Duration::from_secs(5));

        let err = fetcher.execute(&CancellationToken::new()).await.unwrap_err();

        let CredentialError::Fetch(message) = err else {
            panic!("expected fetch error, got {err:?}");
        };
        assert!(message.starts_with("credential command failed to start"), "{message}");
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let fetcher = shell("sleep 5", Duration::from_millis(200));

        let err = fetcher.execute(&CancellationToken::new()).await.unwrap_err();

        assert_eq!(err, CredentialError::Fetch("credential command timed out after 200ms".to_owned()));
    }

    #[tokio::test]
    async fn cancellation_stops_the_command() {
        let fetcher = shell("sleep 5", Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = fetcher.execute(&cancel).await.unwrap_err();

        assert_eq!(err, CredentialError::Fetch("credential command canceled".to_owned()));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
