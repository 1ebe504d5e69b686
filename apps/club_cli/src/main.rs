use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{load_settings, AppEvent, ClubClient, LoadOutcome, ToastKind};
use shared::{
    domain::{CategoryId, ClubId, CommentId, FeedId, NotificationId, UserId},
    protocol::{ClubsQuery, ReportReason},
};
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the configured server url.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    user_id: Option<i64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Feeds {
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Like {
        feed_id: i64,
    },
    DeleteFeed {
        feed_id: i64,
    },
    Report {
        feed_id: i64,
    },
    Block {
        user_id: i64,
    },
    Comments {
        feed_id: i64,
    },
    Comment {
        feed_id: i64,
        content: String,
    },
    DeleteComment {
        feed_id: i64,
        comment_id: i64,
    },
    Clubs {
        #[arg(long, default_value_t = 0)]
        category: i64,
        #[arg(long)]
        recruiting: bool,
        #[arg(long)]
        mine: bool,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Members {
        club_id: i64,
        #[arg(long, default_value_t = 390)]
        width: u32,
    },
    Categories {
        #[arg(long)]
        with_all: bool,
    },
    MyClubs,
    Notifications {
        club_id: i64,
        #[arg(long)]
        read: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(server_url) = cli.server_url {
        settings = settings.with_base_url(server_url);
    }
    let client = ClubClient::new(settings)?;
    let mut events = client.subscribe_events();
    if let Some(token) = cli.token {
        client.sign_in(token, cli.user_id.map(UserId)).await;
    }

    let result = run(&client, cli.command).await;
    print_events(&mut events);
    result
}

async fn run(client: &ClubClient, command: Command) -> Result<()> {
    match command {
        Command::Feeds { pages } => {
            for _ in 0..pages {
                if let LoadOutcome::Skipped(reason) = client.load_more_feeds().await? {
                    println!("stopped paging: {reason:?}");
                    break;
                }
            }
            for feed in client.feed_items().await {
                println!(
                    "#{} [{}] {}: {} ({} likes, {} comments)",
                    feed.id, feed.club_name, feed.user_name, feed.content, feed.likes_count,
                    feed.comment_count
                );
            }
        }
        Command::Like { feed_id } => {
            client.load_more_feeds().await?;
            let state = client.toggle_feed_like(FeedId(feed_id)).await?;
            println!(
                "feed #{feed_id}: liked={} count={}",
                state.liked,
                state.displayed_count()
            );
        }
        Command::DeleteFeed { feed_id } => {
            client.delete_feed(FeedId(feed_id)).await?;
            println!("{} posts after reload", client.feed_items().await.len());
        }
        Command::Report { feed_id } => {
            client.report_feed(FeedId(feed_id), ReportReason::Spam).await?;
        }
        Command::Block { user_id } => {
            client.block_user(UserId(user_id)).await?;
            println!("{} posts after reload", client.feed_items().await.len());
        }
        Command::Comments { feed_id } => {
            let comments = client.load_comments(FeedId(feed_id)).await?;
            println!("{}", serde_json::to_string_pretty(&comments)?);
        }
        Command::Comment { feed_id, content } => {
            let comments = client.submit_comment(FeedId(feed_id), &content).await?;
            println!("{} comments", comments.len());
        }
        Command::DeleteComment {
            feed_id,
            comment_id,
        } => {
            let comments = client
                .delete_comment(FeedId(feed_id), CommentId(comment_id))
                .await?;
            println!("{} comments", comments.len());
        }
        Command::Clubs {
            category,
            recruiting,
            mine,
            pages,
        } => {
            let query = ClubsQuery {
                show_recruiting: recruiting,
                show_my: mine,
                ..ClubsQuery::default()
            }
            .with_category(CategoryId(category));
            let list = client.open_club_list(query).await;
            for _ in 0..pages {
                if let LoadOutcome::Skipped(_) = client.load_more_clubs(&list).await? {
                    break;
                }
            }
            for club in list.items().await {
                println!(
                    "#{} {} ({}/{})",
                    club.id, club.name, club.recruit_number, club.max_number
                );
            }
        }
        Command::Members { club_id, width } => {
            let club_id = ClubId(club_id);
            let roster = client.club_roster(club_id, width).await?;
            if let Some(master) = &roster.master {
                println!("master: {}", master.name);
            }
            for (label, rows) in [("managers", &roster.managers), ("members", &roster.members)] {
                println!("{label}:");
                for row in rows {
                    let names: Vec<&str> = row.iter().map(|member| member.name.as_str()).collect();
                    println!("  {}", names.join(" | "));
                }
            }
            if let Some(role) = client.store().club_role(club_id).await {
                println!("your role: {role:?}");
            }
        }
        Command::Categories { with_all } => {
            for (index, page) in client.category_pages(with_all).await?.iter().enumerate() {
                let names: Vec<&str> = page.iter().map(|category| category.name.as_str()).collect();
                println!("page {}: {}", index + 1, names.join(", "));
            }
        }
        Command::MyClubs => {
            for club in client.my_clubs().await? {
                println!("#{} {}", club.id, club.name);
            }
        }
        Command::Notifications { club_id, read } => {
            if let Some(notification_id) = read {
                client.read_notification(NotificationId(notification_id)).await?;
            }
            let notifications = client.club_notifications(ClubId(club_id)).await?;
            println!("{}", serde_json::to_string_pretty(&notifications)?);
        }
    }
    Ok(())
}

fn print_events(events: &mut broadcast::Receiver<AppEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            AppEvent::Toast(toast) => match toast.kind {
                ToastKind::Success => println!("[ok] {}", toast.message),
                ToastKind::Warning => eprintln!("[warn] {}", toast.message),
            },
            AppEvent::Logout { reason } => eprintln!("session ended: {reason:?}"),
            AppEvent::Refetch(topic) => tracing::debug!(?topic, "cli: refetch requested"),
        }
    }
}
