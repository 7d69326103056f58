use chrono::NaiveDate;
use speculate2::speculate;
use stillpoint::db::{unique_violation, Database};
use stillpoint::focus::{MindState, MindStateEntry};
use stillpoint::models::*;
use uuid::Uuid;

fn create_test_user(db: &Database, name: &str) -> User {
    db.create_user(&format!("{name}@example.com"), name, "$2b$04$stored.hash.placeholder")
        .expect("Failed to create user")
}

fn session_input(day: u32, completed: bool, date: &str) -> CreateSessionInput {
    CreateSessionInput {
        day_number: day,
        duration: 60 + (day - 1) * 10,
        completed,
        actual_time: None,
        clear_percent: 80,
        thought_count: 2,
        mind_state_log: vec![
            MindStateEntry::new(10.0, MindState::Thinking),
            MindStateEntry::new(14.0, MindState::Clear),
        ],
        session_date: date.parse::<NaiveDate>().expect("bad date"),
    }
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "users" {
        it "starts new users on day 1 and private" {
            let user = create_test_user(&db, "ada");
            assert_eq!(user.current_day, 1);
            assert!(!user.is_public);

            let found = db.get_user(user.id).expect("Query failed").expect("missing user");
            assert_eq!(found, user);
        }

        it "returns None for an unknown user" {
            assert!(db.get_user(Uuid::new_v4()).expect("Query failed").is_none());
        }

        it "reports taken emails and usernames" {
            create_test_user(&db, "ada");
            assert!(db.email_taken("ada@example.com").unwrap());
            assert!(!db.email_taken("bob@example.com").unwrap());
            assert!(db.username_taken("ada").unwrap());
            assert!(!db.username_taken("bob").unwrap());
        }

        it "rejects a duplicate email at the storage layer" {
            create_test_user(&db, "ada");
            let result = db.create_user("ada@example.com", "someone_else", "x");
            assert!(result.is_err());
        }

        it "names the column a duplicate collides on" {
            create_test_user(&db, "ada");
            let err = db.create_user("ada@example.com", "someone_else", "x").unwrap_err();
            assert_eq!(unique_violation(&err), Some("users.email"));

            let err = db.create_user("new@example.com", "ada", "x").unwrap_err();
            assert_eq!(unique_violation(&err), Some("users.username"));

            assert_eq!(unique_violation(&anyhow::anyhow!("other")), None);
        }

        it "loads credentials by email" {
            let user = create_test_user(&db, "ada");
            let creds = db.get_credentials_by_email("ada@example.com")
                .expect("Query failed")
                .expect("missing credentials");
            assert_eq!(creds.user.id, user.id);
            assert_eq!(creds.password_hash, "$2b$04$stored.hash.placeholder");
            assert!(db.get_credentials_by_email("nobody@example.com").unwrap().is_none());
        }

        it "updates visibility" {
            let user = create_test_user(&db, "ada");
            let updated = db.update_settings(user.id, UpdateSettingsInput { is_public: Some(true) })
                .expect("Update failed")
                .expect("missing user");
            assert!(updated.is_public);

            let unchanged = db.update_settings(user.id, UpdateSettingsInput::default())
                .unwrap()
                .unwrap();
            assert!(unchanged.is_public);
        }

        it "returns None when updating an unknown user" {
            let result = db.update_settings(Uuid::new_v4(), UpdateSettingsInput { is_public: Some(true) })
                .expect("Update failed");
            assert!(result.is_none());
        }

        it "lists only public users, furthest first, capped" {
            let a = create_test_user(&db, "ada");
            let b = create_test_user(&db, "bob");
            create_test_user(&db, "cy");
            for u in [&a, &b] {
                db.update_settings(u.id, UpdateSettingsInput { is_public: Some(true) }).unwrap();
            }
            db.create_session(b.id, session_input(1, true, "2024-01-01")).unwrap();

            let public = db.get_public_users(50).unwrap();
            let names: Vec<&str> = public.iter().map(|u| u.username.as_str()).collect();
            assert_eq!(names, vec!["bob", "ada"]);

            assert_eq!(db.get_public_users(1).unwrap().len(), 1);
        }
    }

    describe "tokens" {
        it "resolves a fresh token to its user" {
            let user = create_test_user(&db, "ada");
            let token = db.create_token(user.id).expect("Failed to create token");
            let found = db.get_user_by_token(&token).unwrap().expect("token not found");
            assert_eq!(found.id, user.id);
        }

        it "forgets revoked tokens" {
            let user = create_test_user(&db, "ada");
            let token = db.create_token(user.id).unwrap();
            assert!(db.revoke_token(&token).unwrap());
            assert!(db.get_user_by_token(&token).unwrap().is_none());
            assert!(!db.revoke_token(&token).unwrap());
        }

        it "does not resolve unknown tokens" {
            assert!(db.get_user_by_token("nope").unwrap().is_none());
        }
    }

    describe "sessions" {
        it "stores a session and advances the day on completion" {
            let user = create_test_user(&db, "ada");
            let session = db.create_session(user.id, session_input(1, true, "2024-01-01"))
                .expect("Failed to create session");

            assert_eq!(session.day_number, 1);
            assert_eq!(session.actual_time, Some(60));
            assert_eq!(session.mind_state_log.len(), 2);
            assert_eq!(db.get_user(user.id).unwrap().unwrap().current_day, 2);
        }

        it "keeps the day when the attempt was not completed" {
            let user = create_test_user(&db, "ada");
            db.create_session(user.id, session_input(1, false, "2024-01-01")).unwrap();
            assert_eq!(db.get_user(user.id).unwrap().unwrap().current_day, 1);
        }

        it "round-trips the stored fields" {
            let user = create_test_user(&db, "ada");
            let mut input = session_input(1, true, "2024-02-29");
            input.actual_time = Some(57);
            let created = db.create_session(user.id, input).unwrap();

            let sessions = db.get_sessions(user.id).unwrap();
            assert_eq!(sessions.len(), 1);
            let stored = &sessions[0];
            assert_eq!(stored.id, created.id);
            assert_eq!(stored.actual_time, Some(57));
            assert_eq!(stored.session_date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
            assert_eq!(stored.mind_state_log, created.mind_state_log);
            assert_eq!(stored.clear_percent, 80);
            assert_eq!(stored.thought_count, 2);
        }

        it "orders by day descending, newest attempt first" {
            let user = create_test_user(&db, "ada");
            db.create_session(user.id, session_input(1, true, "2024-01-01")).unwrap();
            let first = db.create_session(user.id, session_input(2, false, "2024-01-02")).unwrap();
            let second = db.create_session(user.id, session_input(2, true, "2024-01-03")).unwrap();

            let sessions = db.get_sessions(user.id).unwrap();
            let ids: Vec<Uuid> = sessions.iter().map(|s| s.id).collect();
            assert_eq!(ids[0], second.id);
            assert_eq!(ids[1], first.id);
            assert_eq!(sessions[2].day_number, 1);
        }

        it "finds the latest attempt for a day" {
            let user = create_test_user(&db, "ada");
            db.create_session(user.id, session_input(1, false, "2024-01-01")).unwrap();
            let latest = db.create_session(user.id, session_input(1, true, "2024-01-02")).unwrap();

            let found = db.get_session_by_day(user.id, 1).unwrap().expect("missing session");
            assert_eq!(found.id, latest.id);
            assert!(db.get_session_by_day(user.id, 7).unwrap().is_none());
        }

        it "scopes sessions to their owner" {
            let ada = create_test_user(&db, "ada");
            let bob = create_test_user(&db, "bob");
            let session = db.create_session(ada.id, session_input(1, true, "2024-01-01")).unwrap();

            assert!(db.get_session(ada.id, session.id).unwrap().is_some());
            assert!(db.get_session(bob.id, session.id).unwrap().is_none());
            assert!(db.get_sessions(bob.id).unwrap().is_empty());
        }
    }

    describe "thoughts" {
        it "stores a batch against a session" {
            let user = create_test_user(&db, "ada");
            let session = db.create_session(user.id, session_input(1, true, "2024-01-01")).unwrap();

            let thoughts = db.create_thoughts(user.id, session.id, 1, vec![
                NewThought { time_in_session: 30, text: "rent".into() },
                NewThought { time_in_session: 12, text: "lunch".into() },
                NewThought::note("felt calmer"),
            ]).expect("Failed to create thoughts");
            assert_eq!(thoughts.len(), 3);
            assert!(thoughts.iter().all(|t| t.session_id == session.id));

            let stored = db.get_session_thoughts(session.id).unwrap();
            let texts: Vec<&str> = stored.iter().map(|t| t.text.as_str()).collect();
            assert_eq!(texts, vec!["felt calmer", "lunch", "rent"]);
            assert!(stored[0].is_note());
        }

        it "lists a user's thoughts latest day first" {
            let user = create_test_user(&db, "ada");
            let day1 = db.create_session(user.id, session_input(1, true, "2024-01-01")).unwrap();
            let day2 = db.create_session(user.id, session_input(2, true, "2024-01-02")).unwrap();
            db.create_thoughts(user.id, day1.id, 1, vec![
                NewThought { time_in_session: 5, text: "a".into() },
            ]).unwrap();
            db.create_thoughts(user.id, day2.id, 2, vec![
                NewThought { time_in_session: 40, text: "c".into() },
                NewThought { time_in_session: 20, text: "b".into() },
            ]).unwrap();

            let thoughts = db.get_thoughts(user.id).unwrap();
            let texts: Vec<&str> = thoughts.iter().map(|t| t.text.as_str()).collect();
            assert_eq!(texts, vec!["b", "c", "a"]);

            let other = create_test_user(&db, "bob");
            assert!(db.get_thoughts(other.id).unwrap().is_empty());
        }
    }

    describe "on disk" {
        it "keeps data across reopen" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("nested").join("stillpoint.db");

            let user_id = {
                let disk = Database::open(path.clone()).expect("Failed to open database");
                disk.migrate().unwrap();
                let user = create_test_user(&disk, "ada");
                disk.create_session(user.id, session_input(1, true, "2024-01-01")).unwrap();
                user.id
            };

            let reopened = Database::open(path).expect("Failed to reopen database");
            reopened.migrate().unwrap();
            let user = reopened.get_user(user_id).unwrap().expect("user lost");
            assert_eq!(user.current_day, 2);
            assert_eq!(reopened.get_sessions(user_id).unwrap().len(), 1);
        }
    }
}
