use triage_core::{extract_issue_context, is_duplicate_issue_load, IssueContext, PageLocation};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Events the host page produces.
pub enum PageSignal {
    NavigationChanged(PageLocation),
    /// The page redrew and the render target's anchor no longer holds it.
    AnchorMissing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// What the session reports about its latest run when a signal arrives.
pub struct RunStatus {
    pub in_flight: bool,
    pub has_committed_state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UnchangedLocation,
    DuplicateLoad,
    SameIssue,
    NotOnIssuePage,
}

impl IgnoreReason {
    pub fn as_str(self) -> &'static str {
        match self {
            IgnoreReason::UnchangedLocation => "unchanged_location",
            IgnoreReason::DuplicateLoad => "duplicate_load",
            IgnoreReason::SameIssue => "same_issue",
            IgnoreReason::NotOnIssuePage => "not_on_issue_page",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherDecision {
    Ignore(IgnoreReason),
    /// Left every issue page: cancel work and remove the target.
    Teardown,
    /// Supersede any current run with a fresh one for `location`.
    StartRun {
        location: PageLocation,
        context: IssueContext,
    },
    /// Put the target back. `start_run` is set only when there is neither a
    /// run in flight nor a result to restore.
    RecreateTarget {
        location: PageLocation,
        start_run: bool,
    },
}

#[derive(Debug, Default)]
/// Decides how each page signal affects the session.
pub struct PageWatcher {
    last_location: Option<PageLocation>,
    current_issue: Option<(PageLocation, IssueContext)>,
}

impl PageWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_issue(&self) -> Option<&IssueContext> {
        self.current_issue.as_ref().map(|(_, context)| context)
    }

    pub fn on_signal(&mut self, signal: &PageSignal, status: RunStatus) -> WatcherDecision {
        match signal {
            PageSignal::NavigationChanged(location) => self.on_navigation(location, status),
            PageSignal::AnchorMissing => match &self.current_issue {
                Some((location, _)) => WatcherDecision::RecreateTarget {
                    location: location.clone(),
                    start_run: !status.in_flight && !status.has_committed_state,
                },
                None => WatcherDecision::Ignore(IgnoreReason::NotOnIssuePage),
            },
        }
    }

    fn on_navigation(&mut self, location: &PageLocation, status: RunStatus) -> WatcherDecision {
        if self.last_location.as_ref() == Some(location) {
            return WatcherDecision::Ignore(IgnoreReason::UnchangedLocation);
        }
        self.last_location = Some(location.clone());

        let Some(context) = extract_issue_context(location) else {
            return match self.current_issue.take() {
                Some(_) => WatcherDecision::Teardown,
                None => WatcherDecision::Ignore(IgnoreReason::NotOnIssuePage),
            };
        };

        let same_issue = self
            .current_issue
            .as_ref()
            .is_some_and(|(_, current)| *current == context);
        // The host loads notification links twice. A referrer load only repeats
        // the issue already shown; for any other issue it is a real navigation.
        if same_issue && is_duplicate_issue_load(location) {
            return WatcherDecision::Ignore(IgnoreReason::DuplicateLoad);
        }
        self.current_issue = Some((location.clone(), context.clone()));
        if same_issue && (status.in_flight || status.has_committed_state) {
            return WatcherDecision::Ignore(IgnoreReason::SameIssue);
        }
        WatcherDecision::StartRun {
            location: location.clone(),
            context,
        }
    }
}
