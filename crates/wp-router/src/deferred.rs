//! Deferred prop groups loaded after a page lands.

use wp_visit::Page;
use wp_visit::ReloadOptions;

/// One partial reload per deferred group, ordered by group name.
pub fn deferred_reloads(page: &Page) -> Vec<(String, ReloadOptions)> {
    page.deferred_props
        .iter()
        .filter(|(_, props)| !props.is_empty())
        .map(|(group, props)| (group.clone(), ReloadOptions::new().only(props.iter().cloned())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::deferred_reloads;
    use pretty_assertions::assert_eq;
    use wp_visit::Page;

    #[test]
    fn groups_reload_independently_in_name_order() {
        let page = Page::new("Dashboard", "/")
            .with_deferred_group("stats", ["visits", "sales"])
            .with_deferred_group("feed", ["posts"]);

        let plan: Vec<(String, Vec<String>)> = deferred_reloads(&page)
            .into_iter()
            .map(|(group, options)| (group, options.only.unwrap_or_default()))
            .collect();

        assert_eq!(
            plan,
            vec![
                ("feed".to_owned(), vec!["posts".to_owned()]),
                (
                    "stats".to_owned(),
                    vec!["visits".to_owned(), "sales".to_owned()]
                ),
            ]
        );
    }

    #[test]
    fn empty_groups_are_skipped() {
        let page = Page::new("Dashboard", "/").with_deferred_group("empty", Vec::<String>::new());
        assert!(deferred_reloads(&page).is_empty());
    }
}
