//! Property tests for distribution identity and artifact naming.

use cloudmanager_esp8266::artifact_file_name;
use cloudmanager_esp8266::firmware::sources::distribution_identity;
use cloudmanager_esp8266::BuildRequest;
use proptest::prelude::*;

fn identity_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,20}".prop_filter("must not end in .git", |s| !s.ends_with(".git"))
}

fn release_strategy() -> impl Strategy<Value = String> {
    "v?[0-9]{1,2}\\.[0-9]{1,2}(\\.[0-9]{1,2})?(-rc[0-9])?"
}

proptest! {
    #[test]
    fn identity_ignores_scheme_host_and_path(
        name in identity_strategy(),
        host in "[a-z]{1,10}\\.(com|org|net)",
        owner in "[a-z]{1,10}",
    ) {
        let locators = [
            format!("https://{}/{}/{}.git", host, owner, name),
            format!("git://{}/{}/{}.git", host, owner, name),
            format!("git@{}:{}/{}.git", host, owner, name),
            format!("/srv/mirror/{}/{}", owner, name),
        ];
        for locator in &locators {
            prop_assert_eq!(distribution_identity(locator).unwrap(), name.clone());
        }
    }

    #[test]
    fn identity_is_deterministic(name in identity_strategy()) {
        let locator = format!("https://example.com/{}.git", name);
        prop_assert_eq!(
            distribution_identity(&locator).unwrap(),
            distribution_identity(&locator).unwrap()
        );
    }

    #[test]
    fn artifact_without_release_has_no_suffix(name in identity_strategy()) {
        prop_assert_eq!(
            artifact_file_name(&name, None),
            format!("{}-firmware-combined.bin", name)
        );
    }

    #[test]
    fn artifact_with_release_embeds_it(name in identity_strategy(), release in release_strategy()) {
        let file_name = artifact_file_name(&name, Some(&release));
        let expected_suffix = format!("-{}-firmware-combined.bin", release);
        prop_assert!(file_name.starts_with(&name));
        prop_assert!(file_name.ends_with(&expected_suffix));
    }

    #[test]
    fn well_formed_releases_validate(release in release_strategy()) {
        let request = BuildRequest::new("https://github.com/micropython/micropython.git")
            .with_release(release);
        prop_assert!(request.validate().is_ok());
    }

    #[test]
    fn releases_with_whitespace_are_rejected(head in "[a-z0-9.]{1,5}", tail in "[a-z0-9.]{1,5}") {
        let request = BuildRequest::new("https://github.com/micropython/micropython.git")
            .with_release(format!("{} {}", head, tail));
        prop_assert!(request.validate().is_err());
    }
}
